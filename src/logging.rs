/// Logging setup.
///
/// The library only emits `tracing` events. Applications call [`init`] or
/// [`init_with_level`] once at startup to print them.

use crate::core::{QueryKitError, Result};
use tracing::Level;

/// Installs the default `fmt` subscriber. Returns `false` when a global
/// subscriber was already installed.
pub fn init() -> bool {
    tracing_subscriber::fmt::try_init().is_ok()
}

/// Installs a `fmt` subscriber capped at `level` (`"trace"` to `"error"`).
pub fn init_with_level(level: &str) -> Result<bool> {
    let level: Level = level
        .trim()
        .parse()
        .map_err(|_| QueryKitError::Config(format!("unknown log level '{}'", level)))?;

    Ok(tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_level_is_config_error() {
        assert!(matches!(init_with_level("loud"), Err(QueryKitError::Config(_))));
    }

    #[test]
    fn test_second_init_reports_existing_subscriber() {
        // Whichever call runs first installs; afterwards both report false
        let _ = init_with_level("debug");
        assert!(!init());
        assert!(!init_with_level("info").unwrap());
    }
}
