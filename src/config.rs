use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default worker executable name, looked up next to the running binary.
pub const WORKER_EXECUTABLE: &str = "skeleton-cgal";

/// Top-level configuration loaded from skeleton.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SkeletonConfig {
    pub worker: WorkerConfig,
    pub watchdog: WatchdogConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker executable. `None` resolves [`WORKER_EXECUTABLE`] next to the
    /// current executable.
    pub command: Option<PathBuf>,
    pub args: Vec<String>,
    /// Wall-clock limit per computation; `None` or 0 disables the watchdog.
    pub timeout_secs: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub poll_interval_ms: u64,
    pub grace_period_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            grace_period_ms: 1000,
        }
    }
}

impl WatchdogConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl WorkerConfig {
    /// Configured timeout, with non-positive values meaning "no limit".
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Path of the worker executable to spawn.
    pub fn resolve_command(&self) -> PathBuf {
        if let Some(command) = &self.command {
            return command.clone();
        }
        match std::env::current_exe() {
            Ok(exe) => match exe.parent() {
                Some(dir) => dir.join(WORKER_EXECUTABLE),
                None => PathBuf::from(WORKER_EXECUTABLE),
            },
            Err(e) => {
                tracing::warn!(error = %e, "cannot locate current executable, using PATH lookup");
                PathBuf::from(WORKER_EXECUTABLE)
            }
        }
    }
}

/// Errors loading the configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Load config from `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<SkeletonConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(SkeletonConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}
