use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_FILTER: &str = "warn,muse=info";

/// Logs go to `<logs_dir>/muse.log.YYYY-MM-DD` so the prompt stays clean;
/// `verbose` mirrors them to stderr. `RUST_LOG` overrides the filter.
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init(logs_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(logs_dir, "muse.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);
    let stderr_layer = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    Ok(guard)
}
