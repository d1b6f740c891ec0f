use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter from `RUST_LOG`, else the configured level.
pub(crate) fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Sends tracing output to `log_path`; stdout belongs to the terminal UI.
///
/// Returns false (and logs nothing) when the file cannot be created.
pub(crate) fn init_logging(log_path: &Path, level: &str) -> bool {
    let Ok(file) = File::create(log_path) else {
        return false;
    };
    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_timer(fmt::time::uptime());

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(file_layer)
        .try_init()
        .is_ok()
}
