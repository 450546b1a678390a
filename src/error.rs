//! Recoverable error types (§7b). Anything that can legitimately fail at a
//! system boundary — config parsing today — gets a `thiserror` variant
//! here rather than a panic; internal invariant violations still use
//! `assert!`/`panic!` the way the rest of the crate does.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration from {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ron::de::SpannedError,
    },
}
