//! C6 — leveled, timestamped diagnostics to stderr.

use std::io::Write;

use log::LevelFilter;

/// Map the spec's four verbosity levels onto `log::Level`.
fn level_label(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "ERROR",
        log::Level::Info => "VERBOSE",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    }
}

/// `-v`/`-vv`/`-vvv` select the minimum level; `ERROR` is always emitted
/// regardless of verbosity.
fn level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the global logger. Call exactly once, from `main`, before any
/// other component runs.
pub fn init(verbosity: u8) {
    env_logger::Builder::new()
        .filter_level(level_filter(verbosity))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {}: {}",
                level_label(record.level()),
                chrono::Utc::now().to_rfc3339(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_expected_filter() {
        assert_eq!(level_filter(0), LevelFilter::Error);
        assert_eq!(level_filter(1), LevelFilter::Info);
        assert_eq!(level_filter(2), LevelFilter::Debug);
        assert_eq!(level_filter(3), LevelFilter::Trace);
        assert_eq!(level_filter(99), LevelFilter::Trace);
    }

    #[test]
    fn level_labels_match_spec_vocabulary() {
        assert_eq!(level_label(log::Level::Error), "ERROR");
        assert_eq!(level_label(log::Level::Info), "VERBOSE");
        assert_eq!(level_label(log::Level::Debug), "DEBUG");
        assert_eq!(level_label(log::Level::Trace), "TRACE");
    }
}
