//! Logging setup
//!
//! Structured logging via `tracing`. The CLI picks a preset at startup;
//! library code only ever emits events.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level to display
    pub level: Level,
    /// Include timestamps in each line
    pub timestamps: bool,
    /// Include the emitting module path
    pub include_target: bool,
    /// Include thread IDs
    pub include_thread_ids: bool,
    /// Use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            timestamps: true,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Debug-level preset for `--verbose`
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            include_target: true,
            include_thread_ids: true,
            ..Self::default()
        }
    }

    /// Errors only, no timestamps
    pub fn quiet() -> Self {
        Self {
            level: Level::ERROR,
            timestamps: false,
            ..Self::default()
        }
    }
}

/// Install the global subscriber for the given configuration
///
/// Fails if a subscriber was already installed, so call it once at startup.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let builder = FmtSubscriber::builder()
        .with_max_level(config.level)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .compact();

    let result = if config.timestamps {
        tracing::subscriber::set_global_default(builder.finish())
    } else {
        tracing::subscriber::set_global_default(builder.without_time().finish())
    };

    result.map_err(|e| format!("Failed to initialize logging: {}", e))
}
