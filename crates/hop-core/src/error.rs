//! Startup configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading rule files or the daemon config.
///
/// All of these are fatal to startup; nothing at runtime produces them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template error: {0}")]
    Template(String),

    #[error("bad rule line #{line}: {content:?}")]
    BadLine { line: usize, content: String },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no rule files given")]
    NoRuleFiles,
}
