use clap::ValueEnum;
use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::time::Uptime;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    /// One short line per event; easier to follow at `trace` with frames flowing.
    Compact,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Install the stderr subscriber.
///
/// Every channel session runs on its own named thread, so thread names are
/// always included. With `uptime`, events carry time since start instead of
/// wall-clock time, which lines up with capture intervals and PCM pacing.
pub fn init_logging(format: LogFormat, level: LogLevel, uptime: bool) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true);

    let installed = match (format, uptime) {
        (LogFormat::Text, false) => builder.try_init(),
        (LogFormat::Text, true) => builder.with_timer(Uptime::default()).try_init(),
        (LogFormat::Compact, false) => builder.compact().try_init(),
        (LogFormat::Compact, true) => builder.compact().with_timer(Uptime::default()).try_init(),
        (LogFormat::Json, false) => builder.json().try_init(),
        (LogFormat::Json, true) => builder.json().with_timer(Uptime::default()).try_init(),
    };

    if installed.is_ok() {
        debug!(format = ?format, level = ?level, uptime, "logging initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_disables_everything() {
        assert_eq!(LogLevel::Off.as_filter(), LevelFilter::OFF);
        assert_eq!(LogLevel::Trace.as_filter(), LevelFilter::TRACE);
    }

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!(
            LogFormat::from_str("COMPACT", true).expect("compact should parse"),
            LogFormat::Compact
        );
        assert_eq!(
            LogLevel::from_str("warn", false).expect("warn should parse"),
            LogLevel::Warn
        );
        assert!(LogFormat::from_str("pretty", true).is_err());
    }
}
