use crate::config::AppConfig;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Install the global subscriber once. Logs go to stderr so service
/// managers capture them; `--log-json` switches to machine-readable lines.
pub fn init_tracing(config: &AppConfig) {
    let level = parse_level(&config.log_level);
    let json = config.log_json;
    let _ = TRACING_INIT.get_or_init(|| {
        if json {
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        } else {
            let subscriber = tracing_subscriber::fmt()
                .with_timer(UtcTime::rfc_3339())
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    });
}

/// Validation rejects unknown level strings up front; anything else that
/// slips through reads as info.
fn parse_level(raw: &str) -> Level {
    match raw.to_ascii_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}
