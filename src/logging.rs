use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{DeployError, DeployResult};

/// `deploy_<YYYYmmdd_HHMMSS>.log` for a run started at `now`.
#[must_use]
pub fn log_file_name<Tz>(now: &chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("deploy_{}.log", now.format("%Y%m%d_%H%M%S"))
}

/// Install the global subscriber: human-readable events on stderr and
/// the same events, without colour, in a per-run file under `dir`.
///
/// `RUST_LOG` takes precedence over `verbose`. The returned guard
/// flushes the file writer when dropped and must live until exit.
pub fn init(dir: &Path, verbose: bool) -> DeployResult<(WorkerGuard, PathBuf)> {
    fs::create_dir_all(dir).map_err(|e| DeployError::DirectoryContextFailed {
        path: dir.display().to_string(),
        cause: e.to_string(),
    })?;

    let name = log_file_name(&chrono::Local::now());
    let path = dir.join(&name);
    let appender = tracing_appender::rolling::never(dir, &name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .map_err(|e| DeployError::Io(std::io::Error::other(e.to_string())))?;

    Ok((guard, path))
}
