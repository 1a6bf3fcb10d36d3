use std::io;
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt};

static LOGGING: OnceLock<()> = OnceLock::new();

/// Install the JSON log subscriber on stderr. Safe to call multiple times.
///
/// stdout is reserved for the search event stream, so nothing here may
/// write to it.
pub fn init() {
    LOGGING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
