#![forbid(unsafe_code)]

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Overrides the default level with any `EnvFilter` directive string.
pub const LOG_ENV: &str = "ADRADAR_LOG";

pub fn default_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Installs the stderr subscriber. A second call is a no-op.
pub fn init(verbose: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level(verbose).into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
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
    fn at_logging_01_verbose_lowers_default_level() {
        assert_eq!(default_level(false), LevelFilter::INFO);
        assert_eq!(default_level(true), LevelFilter::DEBUG);
    }
}
