pub mod scrub;

pub use scrub::{sanitize_error, scrub_secrets};

use std::io::IsTerminal;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Parse a log level name (`trace`..`error`, case-insensitive).
pub fn parse_level(raw: &str) -> Option<Level> {
    Level::from_str(raw.trim()).ok()
}

/// Install the process-wide stdout subscriber.
///
/// The trigger service captures stdout into its own log, so colour codes are
/// only emitted when attached to a terminal.
pub fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_ansi(std::io::stdout().is_terminal())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to install log subscriber: {e}");
    }
}
