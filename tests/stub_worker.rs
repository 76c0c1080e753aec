//! End-to-end runs against shell-script stand-ins for the CGAL worker.

use polygon_skeletons::{
    decode_graph, encode_graph, SkeletonWorker, WatchdogConfig, WorkerError,
};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;

/// A canned straight skeleton of the 4x4 square plus a 4-wide label and an
/// exterior vertex, in the worker's output format.
const SQUARE_SKELETON: &str = "\
0 0,0,0,0
1 4,0,0,0
2 4,4,0,0
3 0,4,0,0
4 2,2,2,1
5 6,6,-1.5,0
#
0 4
1 4
2 4
3 4
2 5
";

fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn canned_worker(dir: &TempDir) -> SkeletonWorker {
    let reply = write_script(dir, "reply.txt", SQUARE_SKELETON);
    let script = write_script(dir, "worker.sh", "cat > /dev/null\ncat \"$1\"\n");
    SkeletonWorker::new("sh").with_args([path_arg(&script), path_arg(&reply)])
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn square() -> Vec<Vec<(f64, f64)>> {
    vec![vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]]
}

#[tokio::test]
async fn test_square_skeleton_decodes() {
    let dir = tempfile::tempdir().unwrap();
    let graph = canned_worker(&dir)
        .compute(&square(), Some(Duration::from_secs(10)))
        .await
        .unwrap();

    assert_eq!(graph.node_count(), 6);
    assert_eq!(graph.edge_count(), 5);
    let center = graph.node(4).unwrap();
    assert_eq!(center.position, (2.0, 2.0));
    assert_eq!(center.radius, 2.0);
    assert!(graph.node(5).unwrap().is_exterior());
    assert_eq!(graph.neighbors(4), vec![0, 1, 2, 3]);
    // Corner nodes have zero radius, so nothing is strictly interior but the center.
    assert_eq!(graph.interior_edges().count(), 0);
}

#[tokio::test]
async fn test_computed_graph_survives_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let graph = canned_worker(&dir).compute(&square(), None).await.unwrap();

    let restored = decode_graph(encode_graph(&graph)).unwrap();
    assert_eq!(restored, graph);
}

#[tokio::test]
async fn test_timeout_reported_separately_from_failure() {
    let dir = tempfile::tempdir().unwrap();
    let slow = write_script(&dir, "slow.sh", "cat > /dev/null\nsleep 30\n");
    let failing = write_script(&dir, "fail.sh", "cat > /dev/null\necho 'bad input' >&2\nexit 1\n");
    let fast_watchdog = WatchdogConfig {
        poll_interval_ms: 50,
        grace_period_ms: 200,
    };

    let err = SkeletonWorker::new("sh")
        .with_args([path_arg(&slow)])
        .with_watchdog(fast_watchdog.clone())
        .compute(&square(), Some(Duration::from_millis(250)))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Timeout { .. }), "got {err:?}");

    let err = SkeletonWorker::new("sh")
        .with_args([path_arg(&failing)])
        .with_watchdog(fast_watchdog)
        .compute(&square(), Some(Duration::from_secs(10)))
        .await
        .unwrap_err();
    assert!(
        matches!(err, WorkerError::ProcessFailed { ref diagnostic, .. } if diagnostic == "bad input"),
        "got {err:?}"
    );
}

#[test]
fn test_cli_compute_then_inspect() {
    let dir = tempfile::tempdir().unwrap();
    let reply = write_script(&dir, "reply.txt", SQUARE_SKELETON);
    let script = write_script(&dir, "worker.sh", "cat > /dev/null\ncat \"$1\"\n");
    let config = dir.path().join("skeleton.toml");
    std::fs::write(
        &config,
        format!(
            "[worker]\ncommand = \"sh\"\nargs = [{:?}, {:?}]\ntimeout_secs = 10.0\n",
            path_arg(&script),
            path_arg(&reply)
        ),
    )
    .unwrap();
    let input = dir.path().join("square.json");
    std::fs::write(&input, "[[[0, 0], [4, 0], [4, 4], [0, 4]]]").unwrap();
    let graph_path = dir.path().join("square.tgf");

    let bin = env!("CARGO_BIN_EXE_polygon-skeletons");
    let status = Command::new(bin)
        .arg("compute")
        .arg(&input)
        .arg("-o")
        .arg(&graph_path)
        .arg("-c")
        .arg(&config)
        .status()
        .unwrap();
    assert!(status.success());

    let saved = std::fs::read_to_string(&graph_path).unwrap();
    assert!(saved.starts_with("0 0,0,0\n"));
    assert!(saved.contains("\n4 2,2,2\n"));
    assert!(saved.ends_with("#\n0 4\n1 4\n2 4\n3 4\n2 5\n"));

    let output = Command::new(bin)
        .arg("inspect")
        .arg(&graph_path)
        .arg("-c")
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary = String::from_utf8(output.stdout).unwrap();
    assert!(summary.contains("nodes:          6"));
    assert!(summary.contains("exterior:     1"));
    assert!(summary.contains("max radius:     2"));
}

#[test]
fn test_cli_exit_code_for_worker_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(&dir, "fail.sh", "cat > /dev/null\necho 'bad input' >&2\nexit 1\n");
    let config = dir.path().join("skeleton.toml");
    std::fs::write(
        &config,
        format!("[worker]\ncommand = \"sh\"\nargs = [{:?}]\n", path_arg(&script)),
    )
    .unwrap();
    let input = dir.path().join("square.json");
    std::fs::write(&input, "[[[0, 0], [4, 0], [4, 4]]]").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_polygon-skeletons"))
        .arg("compute")
        .arg(&input)
        .arg("-c")
        .arg(&config)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("bad input"));
}
