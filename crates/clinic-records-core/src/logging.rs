//! Tracing subscriber setup for host applications.

use tracing_subscriber::EnvFilter;

/// Directive used when neither `RUST_LOG` nor the caller supplies one.
pub const DEFAULT_FILTER: &str = "clinic_records_core=info";

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Returns `false` if a global
/// subscriber was already installed.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_reported() {
        // Whichever call lands first wins; later calls must not panic.
        let _ = init("off");
        assert!(!init("off"));
    }
}
