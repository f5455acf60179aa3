//! Diagnostic output.
//!
//! stdout belongs to the hook protocol, so diagnostics only ever go to
//! stderr, and only when `HAL9000_DEBUG` is set. The filter comes from
//! `HAL9000_LOG` (`EnvFilter` syntax) and defaults to `debug`.

use crate::config::Config;
use tracing_subscriber::EnvFilter;

/// Filter directives for diagnostic output.
pub const ENV_LOG_FILTER: &str = "HAL9000_LOG";

const DEFAULT_FILTER: &str = "debug";

/// Install the stderr subscriber if `config.debug` is set.
///
/// Returns whether a subscriber was installed. Calling this more than once is
/// harmless; later calls are ignored.
pub fn init(config: &Config) -> bool {
    if !config.debug {
        return false;
    }

    let filter = EnvFilter::try_from_env(ENV_LOG_FILTER)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_installed_without_debug() {
        assert!(!init(&Config::default()));
    }
}
