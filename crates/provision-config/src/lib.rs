mod config;
mod error;
mod raw;

/// Name of the configuration file looked up by embedding applications.
pub const DEFAULT_CONFIG_FILE: &str = "provisioner.toml";

pub use config::{
    FailureMarkers, FanOutSettings, OrchestratorConfig, PartialFailurePolicy, PollSettings,
    load_config, parse_config,
};
pub use error::ConfigError;

pub type Result<T> = std::result::Result<T, ConfigError>;
