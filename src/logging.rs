//! Tracing subscriber setup for binaries.
//!
//! The numeric `logging_level` setting uses the conventional 10/20/30/40/50
//! scale (debug/info/warn/error/critical); 0 leaves the default of `warn`.
//! `RUST_LOG`, when set, wins over the setting.

use tracing_subscriber::EnvFilter;

pub fn level_directive(level: i64) -> &'static str {
    match level {
        i64::MIN..=0 => "warn",
        1..=10 => "debug",
        11..=20 => "info",
        21..=30 => "warn",
        _ => "error",
    }
}

/// Install a stderr fmt subscriber. Safe to call more than once.
pub fn init(level: i64) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pureport={}", level_directive(level))));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_levels_map_to_directives() {
        assert_eq!(level_directive(0), "warn");
        assert_eq!(level_directive(10), "debug");
        assert_eq!(level_directive(20), "info");
        assert_eq!(level_directive(30), "warn");
        assert_eq!(level_directive(50), "error");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(10);
        init(20);
    }
}
