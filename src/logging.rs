//! Logging initialization
//!
//! Console logging through `env_logger`. The filter is taken from
//! `AR_CAMERA_LOG`, then `RUST_LOG`, then the configured default level.

use std::io::Write;

/// Environment variable holding the log filter
pub const LOG_ENV_VAR: &str = "AR_CAMERA_LOG";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter when neither environment variable is set (default: "info")
    pub default_level: String,
    /// Prefix lines with a timestamp (default: true)
    pub timestamps: bool,
    /// Include the module target in each line (default: true)
    pub show_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            timestamps: true,
            show_target: true,
        }
    }
}

impl LogConfig {
    /// Config with a custom default level
    pub fn with_level(level: impl Into<String>) -> Self {
        Self {
            default_level: level.into(),
            ..Self::default()
        }
    }

    /// Filter string that will be applied
    pub fn resolve_filter(&self) -> String {
        std::env::var(LOG_ENV_VAR)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| self.default_level.clone())
    }
}

/// Initialize the global logger.
///
/// Returns an error if a logger is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), log::SetLoggerError> {
    let filter = config.resolve_filter();

    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&filter);

    let timestamps = config.timestamps;
    let show_target = config.show_target;
    builder.format(move |buf, record| {
        if timestamps {
            write!(buf, "{} ", buf.timestamp_millis())?;
        }
        let level_style = buf.default_level_style(record.level());
        write!(buf, "{level_style}{:<5}{level_style:#} ", record.level())?;
        if show_target {
            write!(buf, "[{}] ", record.target())?;
        }
        writeln!(buf, "{}", record.args())
    });

    builder.try_init()?;

    log::info!(
        "Logging initialized (filter: {}, version {})",
        filter,
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}
