use thiserror::Error;

use super::config::ConfigError;
use super::segmenter::WindowMiss;
use crate::core::alignment::AlignmentError;
use crate::core::geometry::GeometryError;
use crate::core::io::pdb::PdbError;
use crate::core::models::residue::ModelError;
use crate::core::process::ExternalToolError;

/// Failure confined to one helix segment or reference window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentError {
    #[error("Axis fit failed: {0}")]
    Fit(#[from] GeometryError),

    #[error("{0}")]
    Window(#[from] WindowMiss),
}

/// Failure confined to one structure (or one alignment pair) of a batch.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to load structure: {source}")]
    Load {
        #[from]
        source: PdbError,
    },

    #[error("{0}")]
    Tool(#[from] ExternalToolError),

    #[error("Secondary structure assignment failed: {0}")]
    Model(#[from] ModelError),

    #[error("Alignment failed: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("cancelled")]
    Cancelled,

    #[error("Internal logic error: {0}")]
    Internal(String),
}

/// Failure that stops a whole run.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("No input structures were given")]
    NoInputs,

    #[error("Alignment reference '{0}' is not among the input structures")]
    ReferenceNotFound(String),

    #[error("Failed to write output '{path}': {source}")]
    Output {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
