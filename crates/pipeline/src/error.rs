//! Pipeline error taxonomy

use tandem_core::{ContentHash, MarkerParseError};
use tandem_snapshots::SnapshotError;
use tandem_status::TreeError;
use thiserror::Error;

/// Malformed document or marker; the affected unit is left untouched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed marker: {0}")]
    Marker(#[from] MarkerParseError),

    #[error("malformed document: {0}")]
    Malformed(String),
}

/// Failure reported by a translation provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslatorError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("provider returned unusable output: {0}")]
    InvalidOutput(String),

    #[error("translation cancelled")]
    Cancelled,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Errors surfaced by file-level pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("translation of unit {unit_hash} in {file} failed: {message}")]
    Translation {
        file: String,
        unit_hash: ContentHash,
        message: String,
    },

    /// Store or tree failure while working on one unit
    #[error("unit {unit_hash} in {file}: {source}")]
    Unit {
        file: String,
        unit_hash: ContentHash,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("snapshot store error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("status tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
