//! Error types for the spec loader

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors that can occur while loading a pipeline file
#[derive(Debug, Error)]
pub enum LoadError {
    /// The pipeline file could not be read
    #[error("failed to read pipeline file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A YAML document could not be decoded
    #[error("failed to decode YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON document could not be decoded
    #[error("failed to decode JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// A document has no `apiVersion` or `kind`
    #[error("document {index} is missing apiVersion or kind")]
    MissingTypeInfo { index: usize },

    /// No domain type is registered for the document
    #[error("no kind \"{kind}\" is registered for version \"{api_version}\"")]
    UnknownKind { api_version: String, kind: String },

    /// A resource document has no name
    #[error("{kind} document {index} has no metadata.name")]
    MissingName { kind: String, index: usize },

    /// A document's body does not match its kind
    #[error("invalid {kind} document '{name}': {source}")]
    InvalidDocument {
        kind: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The file has no `Pipe` document
    #[error("pipe not found")]
    PipeNotFound,
}

impl LoadError {
    /// Check if this error means the file has no pipeline spec
    pub fn is_pipe_not_found(&self) -> bool {
        matches!(self, Self::PipeNotFound)
    }
}
