//! Process-wide retrieval state, built once from configuration.
//!
//! A [`RetrieverContext`] owns every language space (backend, pipeline and
//! artifact paths) and the router over them. It is created at startup and passed
//! by reference; there is no hidden global model or index cache.

use crate::config::RetrieverConfig;
use crate::error::{Result, RetrieverError};
use crate::retrieval::pipeline::{BuildOutcome, RetrievalPipeline, ScoredChunk};
use crate::retrieval::router::{LanguageRouter, LanguageSpace, Route, Script};
use docqa_context::Segmenter;
use docqa_embed::{Embedder, EmbeddingBackend};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// What happened to one space during [`RetrieverContext::load_or_build`]
#[derive(Debug, Clone, Serialize)]
pub struct SpaceBuild {
    pub name: String,
    pub script: Script,
    pub outcome: BuildOutcome,
    pub chunks: usize,
    pub dimension: Option<usize>,
}

#[derive(Debug)]
pub struct RetrieverContext {
    config: RetrieverConfig,
    router: LanguageRouter,
}

impl RetrieverContext {
    /// Initialize every configured backend and assemble the router.
    ///
    /// # Errors
    /// [`RetrieverError::EmbeddingBackendUnavailable`] if any backend fails to
    /// initialize, [`RetrieverError::Config`] for invalid settings.
    pub async fn from_config(config: RetrieverConfig) -> Result<Self> {
        config.validate()?;
        let mut backends: Vec<Arc<dyn EmbeddingBackend>> = Vec::with_capacity(config.spaces.len());
        for space in &config.spaces {
            info!(
                "Initializing backend for space '{}' ({})",
                space.name,
                space.embedding.backend_id()
            );
            let backend = docqa_embed::create_backend(&space.embedding)
                .await
                .map_err(|source| RetrieverError::EmbeddingBackendUnavailable { source })?;
            backends.push(backend);
        }
        Self::with_backends(config, backends)
    }

    /// Assemble a context around already-created backends, one per configured
    /// space and in the same order.
    pub fn with_backends(
        config: RetrieverConfig,
        backends: Vec<Arc<dyn EmbeddingBackend>>,
    ) -> Result<Self> {
        config.validate()?;
        if backends.len() != config.spaces.len() {
            return Err(RetrieverError::Config(format!(
                "{} backends for {} spaces",
                backends.len(),
                config.spaces.len()
            )));
        }

        let segmenter = Segmenter::new(config.segmenter.clone())
            .map_err(|e| RetrieverError::Config(format!("invalid strip pattern: {e}")))?;
        let segmenter = Arc::new(segmenter);

        let spaces = config
            .spaces
            .iter()
            .zip(backends)
            .map(|(space, backend)| {
                let embedder = Embedder::new(backend)
                    .with_batch_size(space.embedding.batch_size)
                    .with_max_concurrency(space.embedding.max_concurrency);
                LanguageSpace::new(
                    space.name.clone(),
                    space.script,
                    RetrievalPipeline::new(Arc::clone(&segmenter), embedder),
                    config.index_path(space),
                    config.chunks_path(space),
                )
            })
            .collect();
        let router = LanguageRouter::new(spaces)?;

        Ok(Self { config, router })
    }

    /// Make every space ready, reusing stored indices where possible.
    pub async fn load_or_build(&mut self, corpus_text: &str) -> Result<Vec<SpaceBuild>> {
        let mut builds = Vec::new();
        for space in self.router.spaces_mut() {
            let outcome = space
                .pipeline
                .load_or_build(corpus_text, &space.index_path, &space.chunks_path)
                .await?;
            info!(
                "Space '{}' ready with {} chunks ({:?})",
                space.name,
                space.pipeline.len(),
                outcome
            );
            builds.push(space_build(space, outcome));
        }
        Ok(builds)
    }

    /// Rebuild every space from `corpus_text`, ignoring stored indices.
    pub async fn rebuild(&mut self, corpus_text: &str) -> Result<Vec<SpaceBuild>> {
        let mut builds = Vec::new();
        for space in self.router.spaces_mut() {
            space
                .pipeline
                .rebuild(corpus_text, &space.index_path, &space.chunks_path)
                .await?;
            info!("Space '{}' rebuilt with {} chunks", space.name, space.pipeline.len());
            builds.push(space_build(space, BuildOutcome::Built));
        }
        Ok(builds)
    }

    /// Delete the stored index of every space.
    pub fn discard_artifacts(&mut self) -> Result<()> {
        for space in self.router.spaces_mut() {
            space.pipeline.discard(&space.index_path, &space.chunks_path)?;
            info!("Space '{}' index removed", space.name);
        }
        Ok(())
    }

    /// Route `query` and retrieve its `k` nearest chunks with scores.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        match self.router.route(query) {
            Route::Space(space) => space.pipeline.search(query, k).await,
            Route::Unsupported => Err(RetrieverError::UnsupportedLanguage),
        }
    }

    /// Route `query` and retrieve the texts of its `k` nearest chunks.
    pub async fn get_relevant_context(&self, query: &str, k: usize) -> Result<Vec<String>> {
        self.router.route(query).space()?.pipeline.get_relevant_context(query, k).await
    }

    pub fn router(&self) -> &LanguageRouter {
        &self.router
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    pub fn top_k(&self) -> usize {
        self.config.top_k
    }
}

fn space_build(space: &LanguageSpace, outcome: BuildOutcome) -> SpaceBuild {
    SpaceBuild {
        name: space.name.clone(),
        script: space.script,
        outcome,
        chunks: space.pipeline.len(),
        dimension: space.pipeline.dimension(),
    }
}
