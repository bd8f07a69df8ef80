use geodes::engine::config::ConfigError;
use geodes::engine::error::WorkflowError;
use geodes::engine::profile::ProfileError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Merged settings that the descriptor engine rejected.
    #[error("Invalid descriptor settings: {0}")]
    Descriptor(#[from] ConfigError),

    /// Malformed `--set` pairs and out-of-range tool settings.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse config file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Protein profile unavailable: {0}")]
    Profile(#[from] ProfileError),

    #[error("Cannot open log file '{path}': {source}", path = path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
