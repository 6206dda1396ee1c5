use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` overrides the default `debug`
/// level.
pub fn tracing_init() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let subscriber = tracing_subscriber::fmt()
        .with_file(false)
        .with_line_number(false)
        .with_thread_names(false)
        .with_thread_ids(true)
        .with_target(false)
        .with_env_filter(filter)
        .with_timer(ShortTime)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}

/// Prints wall-clock time as `HH:MM:SS`.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ShortTime;

impl FormatTime for ShortTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S"))
    }
}
