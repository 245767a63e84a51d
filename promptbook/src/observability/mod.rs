//! Logging setup.
//!
//! The library only emits `tracing` events. Applications and tests that want
//! to see them call [`init_logging`] once at startup.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set and verbose output is requested.
pub const VERBOSE_FILTER: &str = "promptbook=debug,info";

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "promptbook=info,warn";

/// Builds the filter: `RUST_LOG` if set and valid, otherwise the fallback for
/// `verbose`.
#[must_use]
pub fn env_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a global fmt subscriber.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes.
pub fn init_logging(verbose: bool) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let _ = init_logging(true);
        assert!(!init_logging(false));
    }

    #[test]
    fn test_fallback_filters_parse() {
        assert!(EnvFilter::try_new(VERBOSE_FILTER).is_ok());
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
