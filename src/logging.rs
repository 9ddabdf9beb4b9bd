use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Installs a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Records emitted through the `log` facade by this crate are forwarded to the
/// subscriber as well. Returns `false` if a global subscriber was already set,
/// which makes repeated calls from tests harmless.
pub fn init_logging() -> bool {
    init_logging_with(DEFAULT_FILTER)
}

/// Same as [`init_logging`] with an explicit fallback directive, used when
/// `RUST_LOG` is unset (e.g. `"binance_connector_rs=debug"`).
pub fn init_logging_with(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
