//! Text normalization and order-preserving batch embedding on top of a backend

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingBackend, Vector, create_backend};
use futures::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;

/// Maps text to vectors through an [`EmbeddingBackend`].
///
/// Every text is normalized here before it reaches the backend, so corpus chunks
/// and queries always go through the same transformation.
///
/// # Example
/// ```
/// # tokio_test::block_on(async {
/// use docqa_embed::{EmbedConfig, Embedder};
///
/// let embedder = Embedder::from_config(&EmbedConfig::hashing(16)).await.unwrap();
/// let a = embedder.embed("  Reserve Bank ").await.unwrap();
/// let b = embedder.embed("reserve bank").await.unwrap();
/// assert_eq!(a, b);
/// # });
/// ```
#[derive(Clone)]
pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
    batch_size: usize,
    max_concurrency: usize,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("backend_id", &self.backend.backend_id())
            .field("batch_size", &self.batch_size)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

impl Embedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            backend,
            batch_size: 32,
            max_concurrency: 1,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Build the backend described by `config` and wrap it.
    pub async fn from_config(config: &EmbedConfig) -> Result<Self> {
        let backend = create_backend(config).await?;
        Ok(Self::new(backend)
            .with_batch_size(config.batch_size)
            .with_max_concurrency(config.max_concurrency))
    }

    /// Trim and Unicode lower-case.
    pub fn normalize_text(text: &str) -> String {
        text.trim().to_lowercase()
    }

    /// Embed a single text.
    ///
    /// # Errors
    /// [`EmbedError::EmptyInput`] if nothing is left after normalization, or
    /// whatever the backend reports.
    pub async fn embed(&self, text: &str) -> Result<Vector> {
        let normalized = Self::normalize_text(text);
        if normalized.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        self.backend.embed_text(&normalized).await
    }

    /// Embed many texts, returning vectors in input order.
    ///
    /// Inputs are split into batches of `batch_size` and up to `max_concurrency`
    /// batches run at once. A failing batch is retried one item at a time so the
    /// error carries the position of the offending input.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let normalized: Vec<String> = texts.iter().map(|t| Self::normalize_text(t)).collect();
        if let Some(position) = normalized.iter().position(|t| t.is_empty()) {
            return Err(EmbedError::EmptyInput.at_position(position));
        }

        let batches: Vec<(usize, Vec<String>)> = normalized
            .chunks(self.batch_size)
            .enumerate()
            .map(|(i, batch)| (i * self.batch_size, batch.to_vec()))
            .collect();

        tracing::debug!(
            "Embedding {} texts in {} batches (concurrency {})",
            texts.len(),
            batches.len(),
            self.max_concurrency
        );

        let per_batch: Vec<Vec<Vector>> = stream::iter(batches)
            .map(|(offset, batch)| self.embed_batch(offset, batch))
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        let vectors: Vec<Vector> = per_batch.into_iter().flatten().collect();
        if vectors.len() != texts.len() {
            return Err(EmbedError::invalid_config(format!(
                "Backend returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    async fn embed_batch(&self, offset: usize, batch: Vec<String>) -> Result<Vec<Vector>> {
        match self.backend.embed_texts(&batch).await {
            Ok(result) if result.len() == batch.len() => Ok(result.embeddings),
            Ok(result) => {
                tracing::warn!(
                    "Batch at {} returned {} vectors for {} texts, retrying per item",
                    offset,
                    result.len(),
                    batch.len()
                );
                self.embed_items(offset, &batch).await
            }
            Err(e) => {
                tracing::warn!("Batch at {} failed ({}), retrying per item", offset, e);
                self.embed_items(offset, &batch).await
            }
        }
    }

    async fn embed_items(&self, offset: usize, batch: &[String]) -> Result<Vec<Vector>> {
        let mut vectors = Vec::with_capacity(batch.len());
        for (i, text) in batch.iter().enumerate() {
            let vector = self
                .backend
                .embed_text(text)
                .await
                .map_err(|e| e.at_position(offset + i))?;
            vectors.push(vector);
        }
        Ok(vectors)
    }

    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    pub fn backend_id(&self) -> &str {
        self.backend.backend_id()
    }

    pub fn backend(&self) -> &Arc<dyn EmbeddingBackend> {
        &self.backend
    }
}
