//! Logging setup

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Default directives when `RUST_LOG` is unset
pub fn default_directives(is_development: bool) -> &'static str {
    if is_development {
        "info,fos_sticky=debug"
    } else {
        "info"
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the defaults.
/// Calling it again is harmless.
///
/// The embedder calls this once at startup with the stored
/// `isDevelopment` flag. The filter is fixed from then on: toggling the
/// flag through `updateSettings` takes effect on the next start.
pub fn init(is_development: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(is_development)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        init(true);
        init(false);
        assert_eq!(default_directives(false), "info");
    }
}
