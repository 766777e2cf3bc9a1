//! Error types for retrieval, persistence and batch answering

use crate::synthesis::SynthesisError;
use docqa_embed::EmbedError;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, RetrieverError>;

/// Why a stored index artifact could not be used.
///
/// Both variants are recoverable: the pipeline rebuilds from the corpus.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Index artifact not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Index artifact {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl ArtifactError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexBuildError {
    #[error("Vector {position} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        expected: usize,
        found: usize,
        position: usize,
    },

    #[error("Query has dimension {found}, index has dimension {expected}")]
    QueryDimension { expected: usize, found: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Input has no '{column}' column")]
    MissingColumn { column: String },

    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    /// The corpus produced no chunks
    #[error("Corpus contains no text to index")]
    EmptyCorpus,

    /// The embedding backend could not be initialized
    #[error("Embedding backend unavailable: {source}")]
    EmbeddingBackendUnavailable {
        #[source]
        source: EmbedError,
    },

    /// Embedding a specific input failed; for a query the position is 0
    #[error("Embedding failed for input {position}: {source}")]
    EmbeddingFailed {
        position: usize,
        #[source]
        source: EmbedError,
    },

    #[error("Index build failed: {0}")]
    IndexBuildFailed(#[from] IndexBuildError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("Language not supported or could not be determined")]
    UnsupportedLanguage,

    #[error("Query is empty")]
    QueryEmpty,

    #[error("Retrieval pipeline has not been built")]
    PipelineNotReady,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

impl RetrieverError {
    /// Classify an embedding error raised while ingesting a corpus.
    ///
    /// Errors tied to one input become [`RetrieverError::EmbeddingFailed`];
    /// everything else means the backend itself is not usable.
    pub fn from_embed(error: EmbedError) -> Self {
        match error {
            EmbedError::ItemFailed { position, source } => Self::EmbeddingFailed {
                position,
                source: *source,
            },
            EmbedError::EmptyInput => Self::QueryEmpty,
            other => Self::EmbeddingBackendUnavailable { source: other },
        }
    }

    /// Classify an embedding error raised for a single query.
    ///
    /// The backend was usable at startup, so any failure belongs to this query
    /// alone and is reported as [`RetrieverError::EmbeddingFailed`] at position 0.
    pub fn from_query_embed(error: EmbedError) -> Self {
        match error {
            EmbedError::EmptyInput => Self::QueryEmpty,
            EmbedError::ItemFailed { source, .. } => Self::EmbeddingFailed {
                position: 0,
                source: *source,
            },
            other => Self::EmbeddingFailed {
                position: 0,
                source: other,
            },
        }
    }
}

impl From<toml::de::Error> for RetrieverError {
    fn from(error: toml::de::Error) -> Self {
        Self::Config(error.to_string())
    }
}
