//! Error types for the embedding system

use std::path::PathBuf;

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Initialization problems ([`EmbedError::ModelFileNotFound`],
/// [`EmbedError::ModelInitialization`], [`EmbedError::InvalidConfig`]) are fatal
/// for the backend that raised them. Runtime problems
/// ([`EmbedError::EmbeddingGeneration`], [`EmbedError::EmptyInput`]) concern a
/// single call, and [`EmbedError::ItemFailed`] pins such a failure to one input of
/// a batch.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when model files are not found or invalid
    #[error("Model file not found: {path}")]
    ModelFileNotFound { path: PathBuf },

    /// Error when model configuration is invalid
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error during embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The input was empty after normalization
    #[error("Cannot embed empty text")]
    EmptyInput,

    /// One input of a batch could not be embedded
    #[error("Embedding failed for input {position}: {source}")]
    ItemFailed {
        position: usize,
        #[source]
        source: Box<EmbedError>,
    },

    /// IO errors when reading model files
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Create a model initialization error from any error type.
    pub fn model_init<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ModelInitialization {
            source: Box::new(source),
        }
    }

    /// Create an embedding generation error from any error type.
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::EmbeddingGeneration {
            source: Box::new(source),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Attach the batch position of the input that caused this error.
    pub fn at_position(self, position: usize) -> Self {
        Self::ItemFailed {
            position,
            source: Box::new(self),
        }
    }

    /// The batch position this error refers to, if any.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::ItemFailed { position, .. } => Some(*position),
            _ => None,
        }
    }
}
