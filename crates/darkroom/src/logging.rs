//! Logging initialization.
//!
//! Logs always go to stderr; stdout carries reports and listings.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level used when `RUST_LOG` is unset.
fn default_directive(level: &str, verbose: bool) -> String {
    let level = if verbose { "debug" } else { level };
    match level {
        "error" | "warn" | "info" | "debug" | "trace" => {
            format!("{level},darkroom={level},darkroom_core={level}")
        }
        _ => "info".to_string(),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `level`.
pub fn init(level: &str, verbose: bool, json_format: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level, verbose)));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize from the `[logging]` section, with CLI flags taking precedence.
pub fn init_from_config(
    config: &darkroom_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) {
    let json_format = json_logs_override || config.logging.format == "json";
    init(&config.logging.level, verbose_override, json_format);
}
