use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Targets are matched by prefix, so this covers every `mirrorlink_*` crate.
/// Events from other crates are held to [`THIRD_PARTY_MAX`].
const OWN_TARGET: &str = "mirrorlink";
const THIRD_PARTY_MAX: LevelFilter = LevelFilter::WARN;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Per-crate filter for `level`, optionally replaced by `directives` in the
/// `target=level,...` form (for example `mirrorlink_transport=trace,info`).
///
/// Returns the directive parse error alongside the fallback filter so it can
/// be reported once logging is up.
pub fn log_filter(level: LogLevel, directives: Option<&str>) -> (Targets, Option<String>) {
    if let Some(directives) = directives.map(str::trim).filter(|d| !d.is_empty()) {
        match directives.parse::<Targets>() {
            Ok(targets) => return (targets, None),
            Err(err) => return (default_filter(level), Some(format!("{directives:?}: {err}"))),
        }
    }
    (default_filter(level), None)
}

fn default_filter(level: LogLevel) -> Targets {
    let level = LevelFilter::from(level);
    Targets::new()
        .with_target(OWN_TARGET, level)
        .with_default(level.min(THIRD_PARTY_MAX))
}

/// Install the global subscriber. Logs always go to stderr so stdout stays
/// reserved for command output.
///
/// Targets are shown from `debug` up, where events from several crates
/// interleave.
pub fn init_logging(format: LogFormat, level: LogLevel, directives: Option<&str>) {
    let (filter, rejected) = log_filter(level, directives);
    let verbose = LevelFilter::from(level) >= LevelFilter::DEBUG;
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(LevelFilter::TRACE)
        .with_ansi(false)
        .with_target(verbose)
        .with_thread_names(true);

    let _ = match format {
        LogFormat::Text => builder.finish().with(filter).try_init(),
        LogFormat::Json => builder.json().finish().with(filter).try_init(),
    };

    if let Some(rejected) = rejected {
        tracing::warn!(directives = %rejected, "ignoring invalid MIRRORLINK_LOG");
    }
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn own_crates_follow_the_chosen_level() {
        let (filter, rejected) = log_filter(LogLevel::Debug, None);
        assert!(rejected.is_none());
        assert!(filter.would_enable("mirrorlink", &Level::DEBUG));
        assert!(filter.would_enable("mirrorlink_transport::transport", &Level::DEBUG));
        assert!(!filter.would_enable("mirrorlink_shm", &Level::TRACE));
    }

    #[test]
    fn other_crates_are_capped_at_warn() {
        let (filter, _) = log_filter(LogLevel::Trace, None);
        assert!(filter.would_enable("ctrlc", &Level::WARN));
        assert!(!filter.would_enable("ctrlc", &Level::INFO));

        // A stricter chosen level still applies to everything.
        let (filter, _) = log_filter(LogLevel::Error, None);
        assert!(!filter.would_enable("ctrlc", &Level::WARN));
        assert!(!filter.would_enable("mirrorlink_wire", &Level::WARN));
    }

    #[test]
    fn directives_replace_the_default_filter() {
        let (filter, rejected) =
            log_filter(LogLevel::Info, Some("mirrorlink_transport=trace,error"));
        assert!(rejected.is_none());
        assert!(filter.would_enable("mirrorlink_transport", &Level::TRACE));
        assert!(!filter.would_enable("mirrorlink_command", &Level::INFO));
    }

    #[test]
    fn invalid_directives_fall_back_to_the_level() {
        let (filter, rejected) = log_filter(LogLevel::Info, Some("mirrorlink=loud"));
        assert!(rejected.is_some());
        assert!(filter.would_enable("mirrorlink_command", &Level::INFO));
        assert!(!filter.would_enable("mirrorlink_command", &Level::DEBUG));

        let (_, rejected) = log_filter(LogLevel::Info, Some("  "));
        assert!(rejected.is_none());
    }
}
