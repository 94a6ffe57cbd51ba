use std::fs::OpenOptions;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Log to stdout, and to `<log_dir>/lingrbot.log` when a directory is given.
///
/// Keep the returned guard alive for the life of the process or buffered file
/// output is lost.
pub fn init(log_dir: Option<&Path>) -> std::io::Result<Option<WorkerGuard>> {
    let filter = || EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("lingrbot.log"))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stdout).with_filter(filter()))
        .with(file_layer)
        .init();

    Ok(guard)
}
