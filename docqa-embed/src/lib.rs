//! # docqa-embed
//!
//! Text embeddings for the docqa retrieval pipeline. Local ONNX models run through
//! FastEmbed; an offline hashing backend covers tests and air-gapped machines.
//!
//! ## Features
//!
//! - **Local ONNX Models**: LaBSE and all-mpnet-base-v2 by default, or any
//!   sentence-transformers ONNX export on HuggingFace
//! - **Pluggable Backends**: everything goes through the [`EmbeddingBackend`] trait
//! - **Symmetric Normalization**: the [`Embedder`] trims and lower-cases every text,
//!   corpus and query alike
//! - **Ordered Batching**: concurrent batches reassembled in input order
//!
//! ## Quick Start
//!
//! ```no_run
//! use docqa_embed::{EmbedConfig, Embedder};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let embedder = Embedder::from_config(&EmbedConfig::labse("models")).await?;
//!
//! let texts = vec!["भारतीय रिज़र्व बैंक".to_string(), "Reserve Bank".to_string()];
//! let vectors = embedder.embed_many(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}", vectors.len(), embedder.dimension());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: model and backend configuration
//! - [`provider`]: the backend trait and the FastEmbed backend
//! - [`hashing`]: the offline feature-hashing backend
//! - [`embedder`]: normalization and batching
//! - [`downloader`]: HuggingFace model downloading
//! - [`error`]: error types
//!
//! Backends are created explicitly with [`create_backend`] and shared through an
//! `Arc`; nothing is cached globally.

pub mod config;
pub mod downloader;
pub mod embedder;
pub mod error;
pub mod hashing;
pub mod provider;

pub use config::{BackendKind, EmbedConfig, TokenizerConfig};
pub use downloader::ModelDownloader;
pub use embedder::Embedder;
pub use error::{EmbedError, Result};
pub use hashing::HashingBackend;
pub use provider::{
    EmbeddingBackend, EmbeddingResult, FastEmbedBackend, Vector, create_backend,
};
