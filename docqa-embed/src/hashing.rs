//! Feature-hashing backend that needs no model files.
//!
//! Each word token is hashed into one of `dimension` buckets and the bucket
//! counts are mean-pooled over the (truncated) token sequence. Texts sharing
//! vocabulary land close together, which is enough for offline runs and tests.

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingBackend, EmbeddingResult, Vector};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone)]
pub struct HashingBackend {
    dimension: usize,
    max_tokens: usize,
    backend_id: String,
}

impl HashingBackend {
    pub fn new(dimension: usize, max_tokens: usize, backend_id: impl Into<String>) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::invalid_config("dimension must be greater than 0"));
        }
        if max_tokens == 0 {
            return Err(EmbedError::invalid_config("max_length must be greater than 0"));
        }
        Ok(Self {
            dimension,
            max_tokens,
            backend_id: backend_id.into(),
        })
    }

    /// Embed one text. Text without any word tokens maps to the zero vector.
    pub fn embed_one(&self, text: &str) -> Vector {
        let mut vector = vec![0.0f32; self.dimension];
        let mut tokens = 0usize;

        for word in text.unicode_words().take(self.max_tokens) {
            let mut hasher = FnvHasher::default();
            hasher.write(word.as_bytes());
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
            tokens += 1;
        }

        if tokens > 0 {
            let scale = 1.0 / tokens as f32;
            vector.iter_mut().for_each(|v| *v *= scale);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingBackend for HashingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let embeddings: Vec<Vector> = texts.iter().map(|t| self.embed_one(t)).collect();
        Ok(EmbeddingResult {
            embeddings,
            dimension: self.dimension,
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn backend_id(&self) -> &str {
        &self.backend_id
    }
}
