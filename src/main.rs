use clap::{Parser, Subcommand};
use polygon_skeletons::geometry::{self, Polygon};
use polygon_skeletons::{load_config, read_graph, wire, SkeletonConfig, SkeletonWorker, WorkerError};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Compute straight skeletons of polygon soups with the external CGAL worker.
#[derive(Parser, Debug)]
#[command(name = "polygon-skeletons", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "skeleton.toml")]
    config: PathBuf,

    /// Extra logging (watchdog polling, decoded graph sizes)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the worker on a JSON polygon soup and write the skeleton graph
    Compute {
        /// JSON file shaped like [[[x, y], ...], ...]
        input: PathBuf,

        /// Graph output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Timeout in seconds; 0 disables the watchdog (overrides config)
        #[arg(long)]
        timeout: Option<f64>,

        /// Worker executable (overrides config)
        #[arg(long)]
        worker: Option<PathBuf>,
    },
    /// Summarize a saved skeleton graph
    Inspect {
        /// Graph file written by `compute`
        graph: PathBuf,
    },
    /// Print the worker request lines for a JSON polygon soup
    Encode {
        /// JSON file shaped like [[[x, y], ...], ...]
        input: PathBuf,
    },
}

/// Process exit code for each failure kind.
fn failure_code(err: &WorkerError) -> u8 {
    match err {
        WorkerError::ProcessFailed { .. } => 2,
        WorkerError::Timeout { .. } => 3,
        WorkerError::Protocol(_) => 4,
        WorkerError::Spawn { .. } | WorkerError::Io { .. } => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let config = match load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Compute {
            input,
            output,
            timeout,
            worker,
        } => compute(config, &input, output.as_deref(), timeout, worker).await,
        Commands::Inspect { graph } => inspect(&graph),
        Commands::Encode { input } => encode(&input),
    }
}

fn load_soup(path: &Path) -> Option<Vec<Polygon>> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "cannot open polygon soup");
            return None;
        }
    };
    match geometry::read_polygon_soup(BufReader::new(file)) {
        Ok(soup) => Some(soup),
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "cannot read polygon soup");
            None
        }
    }
}

async fn compute(
    mut config: SkeletonConfig,
    input: &Path,
    output: Option<&Path>,
    timeout: Option<f64>,
    worker: Option<PathBuf>,
) -> ExitCode {
    if let Some(command) = worker {
        config.worker.command = Some(command);
    }
    if let Some(secs) = timeout {
        config.worker.timeout_secs = Some(secs);
    }

    let Some(polygons) = load_soup(input) else {
        return ExitCode::FAILURE;
    };
    if let Some(((min_x, min_y), (max_x, max_y))) = geometry::bounds(&polygons) {
        tracing::debug!(
            polygons = polygons.len(),
            width = max_x - min_x,
            height = max_y - min_y,
            "loaded polygon soup"
        );
    }

    let worker = SkeletonWorker::from_config(&config);
    let graph = match worker.compute(&polygons, config.worker.timeout()).await {
        Ok(g) => g,
        Err(e) => {
            tracing::error!(error = %e, "skeleton computation failed");
            return ExitCode::from(failure_code(&e));
        }
    };

    let written = match output {
        Some(path) => std::fs::File::create(path)
            .and_then(|f| wire::write_graph(&graph, BufWriter::new(f))),
        None => wire::write_graph(&graph, BufWriter::new(std::io::stdout().lock())),
    };
    if let Err(e) = written {
        tracing::error!(error = %e, "failed to write skeleton graph");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "skeleton computed"
    );
    ExitCode::SUCCESS
}

fn inspect(path: &Path) -> ExitCode {
    let graph = match std::fs::File::open(path)
        .map_err(Into::into)
        .and_then(|f| read_graph(BufReader::new(f)))
    {
        Ok(g) => g,
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "cannot read skeleton graph");
            return ExitCode::FAILURE;
        }
    };

    let exterior = graph.nodes().iter().filter(|n| n.is_exterior()).count();
    println!("nodes:          {}", graph.node_count());
    println!("  interior:     {}", graph.node_count() - exterior);
    println!("  exterior:     {}", exterior);
    println!("edges:          {}", graph.edge_count());
    println!("  interior:     {}", graph.interior_edges().count());
    match graph.max_radius() {
        Some(r) => println!("max radius:     {r}"),
        None => println!("max radius:     -"),
    }
    ExitCode::SUCCESS
}

fn encode(input: &Path) -> ExitCode {
    let Some(polygons) = load_soup(input) else {
        return ExitCode::FAILURE;
    };
    let mut out = BufWriter::new(std::io::stdout().lock());
    for line in wire::encode_polygons(&polygons) {
        if let Err(e) = writeln!(out, "{line}") {
            tracing::error!(error = %e, "failed to write request lines");
            return ExitCode::FAILURE;
        }
    }
    if let Err(e) = out.flush() {
        tracing::error!(error = %e, "failed to write request lines");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
