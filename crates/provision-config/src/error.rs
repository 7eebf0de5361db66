use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration")]
    ParseText(#[from] toml::de::Error),

    #[error("'{field}' must be at least 1")]
    ZeroValue { field: &'static str },

    #[error("marker '{field}' cannot be empty")]
    EmptyMarker { field: String },
}
