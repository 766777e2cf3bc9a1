//! docqa-retriever: Semantic retrieval over extracted document text
//!
//! This crate answers questions against a corpus by retrieving the sentences
//! closest to the question in an embedding space. Each script (Devanagari,
//! Latin) gets its own language space with its own model and persisted index;
//! queries are routed by script.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: Vector index, build-once pipeline and language routing
//! - **[`storage`]**: Atomic, lock-protected persistence of index artifacts
//! - **[`context`]**: The process-wide [`RetrieverContext`] built from [`RetrieverConfig`]
//! - **[`assistant`]**: Question answering that degrades failures to plain messages
//! - **[`synthesis`]**: Answer synthesis from retrieved context
//! - **[`batch`]**: Answering a CSV of questions
//! - **[`status`]**: Artifact health reporting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docqa_retriever::{RetrieverConfig, RetrieverContext};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut context = RetrieverContext::from_config(RetrieverConfig::default()).await?;
//! context.load_or_build("RBI stands for Reserve Bank of India. It regulates banks.").await?;
//!
//! let passages = context.get_relevant_context("What does RBI stand for?", 1).await?;
//! println!("{passages:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! corpus → Segmenter → Embedder → FlatIndex → IndexStore
//!                                     ↓
//! question → LanguageRouter → RetrievalPipeline → AnswerSynthesizer
//! ```

pub mod assistant;
pub mod batch;
pub mod config;
pub mod context;
pub mod corpus;
pub mod error;
pub mod retrieval;
pub mod status;
pub mod storage;
pub mod synthesis;

pub use assistant::{Answer, Assistant, NO_CONTENT_MESSAGE, NO_CONTEXT_MESSAGE};
pub use config::RetrieverConfig;
pub use context::RetrieverContext;
pub use error::{ArtifactError, BatchError, IndexBuildError, Result, RetrieverError};
pub use retrieval::router::UNSUPPORTED_LANGUAGE_MESSAGE;
