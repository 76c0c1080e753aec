/// Single computation lifecycle: spawn the skeleton worker, feed it the polygon
/// soup, enforce the optional deadline, and decode what it prints.
use crate::config::{SkeletonConfig, WatchdogConfig};
use crate::geometry::Polygon;
use crate::graph::SkeletonGraph;
use crate::watchdog::Watchdog;
use crate::wire::{self, ProtocolError};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Errors that can occur during a computation.
#[derive(Debug)]
pub enum WorkerError {
    /// The worker executable could not be started.
    Spawn {
        command: PathBuf,
        source: std::io::Error,
    },
    /// Failed to talk to the worker's pipes or wait on it.
    Io { source: std::io::Error },
    /// The worker exited unsuccessfully on its own.
    ProcessFailed {
        status: ExitStatus,
        /// Captured stderr, or stdout when stderr was empty.
        diagnostic: String,
    },
    /// The watchdog had to terminate the worker.
    Timeout {
        timeout: Duration,
        diagnostic: String,
    },
    /// The worker exited cleanly but its output is malformed.
    Protocol(ProtocolError),
}

impl WorkerError {
    /// Exit code of a failed worker, when it exited rather than being signalled.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            WorkerError::ProcessFailed { status, .. } => status.code(),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::Spawn { command, source } => {
                write!(
                    f,
                    "failed to spawn skeleton worker {}: {}",
                    command.display(),
                    source
                )
            }
            WorkerError::Io { source } => {
                write!(f, "I/O error talking to skeleton worker: {}", source)
            }
            WorkerError::ProcessFailed { status, diagnostic } => {
                write!(f, "skeleton worker failed ({status})")?;
                if !diagnostic.is_empty() {
                    write!(f, ":\n{diagnostic}")?;
                }
                Ok(())
            }
            WorkerError::Timeout {
                timeout,
                diagnostic,
            } => {
                write!(
                    f,
                    "skeleton worker exceeded {:.3}s timeout and was terminated",
                    timeout.as_secs_f64()
                )?;
                if !diagnostic.is_empty() {
                    write!(f, ":\n{diagnostic}")?;
                }
                Ok(())
            }
            WorkerError::Protocol(e) => write!(f, "unreadable skeleton worker output: {e}"),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Spawn { source, .. } => Some(source),
            WorkerError::Io { source } => Some(source),
            WorkerError::Protocol(e) => Some(e),
            WorkerError::ProcessFailed { .. } | WorkerError::Timeout { .. } => None,
        }
    }
}

/// Handle on the external skeleton executable.
///
/// Holds no process state; every [`compute`](SkeletonWorker::compute) call owns
/// its own child and watchdog, so one worker can serve concurrent calls.
#[derive(Debug, Clone)]
pub struct SkeletonWorker {
    command: PathBuf,
    args: Vec<String>,
    watchdog: WatchdogConfig,
}

impl SkeletonWorker {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            watchdog: WatchdogConfig::default(),
        }
    }

    pub fn from_config(config: &SkeletonConfig) -> Self {
        Self {
            command: config.worker.resolve_command(),
            args: config.worker.args.clone(),
            watchdog: config.watchdog.clone(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_watchdog(mut self, watchdog: WatchdogConfig) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Run the worker once over `polygons`.
    ///
    /// With a non-zero `timeout`, a watchdog terminates the worker's process
    /// group if it overruns. Stdin is written from its own task while stdout
    /// and stderr are drained, so large requests and responses cannot fill a
    /// pipe and stall both sides. The child is reaped on every path; dropping
    /// the future kills it.
    pub async fn compute(
        &self,
        polygons: &[Polygon],
        timeout: Option<Duration>,
    ) -> Result<SkeletonGraph, WorkerError> {
        let mut request = wire::encode_polygons(polygons).join("\n");
        request.push('\n');

        tracing::info!(
            command = %self.command.display(),
            polygons = polygons.len(),
            request_bytes = request.len(),
            "spawning skeleton worker"
        );
        let start = Instant::now();

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0) // Own group so escalation reaches grandchildren
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::Spawn {
                command: self.command.clone(),
                source: e,
            })?;

        let pid = child.id().unwrap_or(0);
        tracing::debug!(pid, "skeleton worker started");

        let timeout = timeout.filter(|t| !t.is_zero());
        let watchdog = match timeout {
            Some(limit) if pid != 0 => Some(Watchdog::new(pid, limit, &self.watchdog).arm()),
            _ => None,
        };

        let mut stdin = child.stdin.take().ok_or_else(|| WorkerError::Io {
            source: std::io::Error::other("worker stdin was not captured"),
        })?;
        let writer = tokio::spawn(async move {
            stdin.write_all(request.as_bytes()).await?;
            stdin.shutdown().await
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| WorkerError::Io { source: e })?;

        let escalated = match watchdog {
            Some((exit_notice, handle)) => {
                drop(exit_notice);
                match handle.await {
                    Ok(outcome) => outcome.escalated(),
                    Err(e) => {
                        tracing::warn!(error = %e, "watchdog task failed");
                        false
                    }
                }
            }
            None => false,
        };

        let write_error = match writer.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::debug!(pid, "worker closed stdin before reading the full request");
                None
            }
            Ok(Err(e)) => Some(e),
            Err(e) => Some(std::io::Error::other(e)),
        };

        tracing::info!(
            pid,
            exit_code = ?output.status.code(),
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "skeleton worker exited"
        );

        if let (true, Some(timeout)) = (escalated, timeout) {
            return Err(WorkerError::Timeout {
                timeout,
                diagnostic: diagnostic(&output.stdout, &output.stderr),
            });
        }
        if !output.status.success() {
            return Err(WorkerError::ProcessFailed {
                status: output.status,
                diagnostic: diagnostic(&output.stdout, &output.stderr),
            });
        }
        if let Some(e) = write_error {
            return Err(WorkerError::Io { source: e });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let graph = wire::decode_skeleton(stdout.lines()).map_err(WorkerError::Protocol)?;
        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "decoded skeleton"
        );
        Ok(graph)
    }
}

/// Stderr if the worker wrote any, else stdout.
fn diagnostic(stdout: &[u8], stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(stdout)
    } else {
        stderr
    };
    text.trim_end().to_string()
}
