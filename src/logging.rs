//! Logging setup for the pipeline and the CLI.
//!
//! Library code logs through `tracing` with one target per subsystem:
//! `chunker`, `training`, `embedding`, `vector`, `storage`, `retrieval`.
//! Levels come from the `[logging]` settings section unless `RUST_LOG` is set.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"      # quiet by default
//!
//! [logging.modules]
//! training = "info"     # per-epoch loss
//! embedding = "debug"   # model reloads
//! ```
//!
//! # Environment Variable
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=training=info ragline train --all
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Build the filter directive string from config: `default,target=level,...`.
fn filter_directives(config: &LoggingConfig) -> String {
    config
        .modules
        .iter()
        .fold(config.default.clone(), |mut acc, (target, level)| {
            acc.push_str(&format!(",{target}={level}"));
            acc
        })
}

/// Initialize logging with configuration.
///
/// Only the first call installs a subscriber; later calls are ignored, so
/// tests and the CLI can both call this freely. Output goes to stderr to keep
/// stdout clean for `--json` results.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Initialize logging with default configuration (`warn`).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_appends_modules_in_order() {
        let mut config = LoggingConfig::default();
        config.modules.insert("training".into(), "info".into());
        config.modules.insert("vector".into(), "debug".into());

        assert_eq!(
            filter_directives(&config),
            "warn,training=info,vector=debug"
        );
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init_with_config(&LoggingConfig::default());
    }
}
