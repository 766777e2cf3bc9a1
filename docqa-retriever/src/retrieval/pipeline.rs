//! Build-once, query-many retrieval over one embedding space.
//!
//! A [`RetrievalPipeline`] is either `Unbuilt` or `Ready`. [`load_or_build`]
//! reuses a stored artifact when it is valid for the pipeline's backend and
//! otherwise segments, embeds, indexes and saves the corpus. Queries are only
//! served once the pipeline is ready.
//!
//! [`load_or_build`]: RetrievalPipeline::load_or_build

use crate::error::{ArtifactError, Result, RetrieverError};
use crate::retrieval::vector_index::FlatIndex;
use crate::storage::{IndexArtifact, IndexStore};
use docqa_context::Segmenter;
use docqa_embed::Embedder;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone)]
enum PipelineState {
    Unbuilt,
    Ready { index: FlatIndex, chunks: Vec<String> },
}

/// A retrieved chunk with its index row and distance to the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub position: usize,
    pub distance: f32,
    pub text: String,
}

/// How a pipeline became ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    /// A stored artifact was reused; nothing was embedded
    Loaded,
    /// The corpus was embedded and the artifact written
    Built,
}

#[derive(Debug, Clone)]
pub struct RetrievalPipeline {
    segmenter: Arc<Segmenter>,
    embedder: Embedder,
    store: IndexStore,
    state: PipelineState,
}

impl RetrievalPipeline {
    pub fn new(segmenter: Arc<Segmenter>, embedder: Embedder) -> Self {
        let store = IndexStore::new(embedder.backend_id());
        Self {
            segmenter,
            embedder,
            store,
            state: PipelineState::Unbuilt,
        }
    }

    /// Make the pipeline ready, reusing the stored artifact if possible.
    ///
    /// A missing or unusable artifact is rebuilt from `corpus_text`. On failure
    /// the pipeline is left unbuilt and nothing is written.
    pub async fn load_or_build(
        &mut self,
        corpus_text: &str,
        index_path: &Path,
        chunks_path: &Path,
    ) -> Result<BuildOutcome> {
        match self.store.load(index_path, chunks_path) {
            Ok(IndexArtifact { index, chunks }) => {
                info!("Reusing stored index with {} chunks", chunks.len());
                self.state = PipelineState::Ready { index, chunks };
                return Ok(BuildOutcome::Loaded);
            }
            Err(ArtifactError::NotFound { path }) => {
                info!("No stored index at {}, building", path.display());
            }
            Err(e @ ArtifactError::Corrupt { .. }) => {
                warn!("{}, rebuilding", e);
            }
        }

        self.build(corpus_text, index_path, chunks_path).await?;
        Ok(BuildOutcome::Built)
    }

    /// Build from `corpus_text` without consulting the stored artifact.
    ///
    /// The stored pair and the in-memory index are only replaced once the new
    /// pair has been saved, so a failed rebuild keeps serving the previous one.
    pub async fn rebuild(
        &mut self,
        corpus_text: &str,
        index_path: &Path,
        chunks_path: &Path,
    ) -> Result<()> {
        self.build(corpus_text, index_path, chunks_path).await
    }

    /// Delete the stored artifact and return to `Unbuilt`.
    pub fn discard(&mut self, index_path: &Path, chunks_path: &Path) -> Result<()> {
        self.state = PipelineState::Unbuilt;
        self.store.remove(index_path, chunks_path)?;
        Ok(())
    }

    // The current state is kept until the new index is saved
    async fn build(&mut self, corpus_text: &str, index_path: &Path, chunks_path: &Path) -> Result<()> {
        let chunks: Vec<String> = self
            .segmenter
            .segment(corpus_text)
            .into_iter()
            .map(|chunk| chunk.text)
            .collect();
        if chunks.is_empty() {
            return Err(RetrieverError::EmptyCorpus);
        }
        info!(
            "Embedding {} chunks with {}",
            chunks.len(),
            self.embedder.backend_id()
        );

        let vectors = self
            .embedder
            .embed_many(&chunks)
            .await
            .map_err(RetrieverError::from_embed)?;
        let index = FlatIndex::build(&vectors)?;
        self.store.save(&index, &chunks, index_path, chunks_path)?;

        self.state = PipelineState::Ready { index, chunks };
        Ok(())
    }

    /// Texts of the `k` chunks nearest to `query`, best first.
    ///
    /// An empty result means nothing relevant was found.
    pub async fn get_relevant_context(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self
            .search(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    /// Like [`get_relevant_context`](Self::get_relevant_context), keeping positions and distances.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let PipelineState::Ready { index, chunks } = &self.state else {
            return Err(RetrieverError::PipelineNotReady);
        };
        if query.trim().is_empty() {
            return Err(RetrieverError::QueryEmpty);
        }
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed(query)
            .await
            .map_err(RetrieverError::from_query_embed)?;
        let neighbors = index.search(&query_vector, k)?;
        debug!("Query matched {} neighbors", neighbors.len());

        Ok(neighbors
            .into_iter()
            .filter_map(|n| {
                chunks.get(n.position).map(|text| ScoredChunk {
                    position: n.position,
                    distance: n.distance,
                    text: text.clone(),
                })
            })
            .collect())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, PipelineState::Ready { .. })
    }

    /// Number of indexed chunks; 0 while unbuilt.
    pub fn len(&self) -> usize {
        match &self.state {
            PipelineState::Ready { chunks, .. } => chunks.len(),
            PipelineState::Unbuilt => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension of the loaded index, if ready.
    pub fn dimension(&self) -> Option<usize> {
        match &self.state {
            PipelineState::Ready { index, .. } => Some(index.dimension()),
            PipelineState::Unbuilt => None,
        }
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_embed::{EmbedConfig, HashingBackend};
    use tempfile::tempdir;

    fn pipeline() -> RetrievalPipeline {
        let backend = HashingBackend::new(64, 512, "hashing:64;max_length=512").unwrap();
        RetrievalPipeline::new(
            Arc::new(Segmenter::default()),
            Embedder::new(Arc::new(backend)),
        )
    }

    #[tokio::test]
    async fn test_unbuilt_pipeline_rejects_queries() {
        let pipeline = pipeline();

        assert!(!pipeline.is_ready());
        assert_eq!(pipeline.len(), 0);
        assert_eq!(pipeline.dimension(), None);
        assert!(matches!(
            pipeline.get_relevant_context("anything", 5).await,
            Err(RetrieverError::PipelineNotReady)
        ));
    }

    #[tokio::test]
    async fn test_rbi_scenario() {
        let dir = tempdir().unwrap();
        let mut pipeline = pipeline();
        let corpus = "RBI stands for Reserve Bank of India. It regulates banks.";

        let outcome = pipeline
            .load_or_build(corpus, &dir.path().join("i.bin"), &dir.path().join("c.json"))
            .await
            .unwrap();

        assert_eq!(outcome, BuildOutcome::Built);
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.dimension(), Some(64));
        let context = pipeline
            .get_relevant_context("What does RBI stand for?", 1)
            .await
            .unwrap();
        assert_eq!(context, vec!["RBI stands for Reserve Bank of India."]);
    }

    #[tokio::test]
    async fn test_empty_corpus_stays_unbuilt() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("i.bin");
        let mut pipeline = pipeline();

        let result = pipeline
            .load_or_build("  \n\t ", &index_path, &dir.path().join("c.json"))
            .await;

        assert!(matches!(result, Err(RetrieverError::EmptyCorpus)));
        assert!(!pipeline.is_ready());
        assert!(!index_path.exists());
    }

    #[tokio::test]
    async fn test_empty_query() {
        let dir = tempdir().unwrap();
        let mut pipeline = pipeline();
        pipeline
            .load_or_build("One sentence.", &dir.path().join("i.bin"), &dir.path().join("c.json"))
            .await
            .unwrap();

        assert!(matches!(
            pipeline.get_relevant_context("   ", 5).await,
            Err(RetrieverError::QueryEmpty)
        ));
    }

    #[tokio::test]
    async fn test_search_reports_positions() {
        let dir = tempdir().unwrap();
        let mut pipeline = pipeline();
        pipeline
            .load_or_build(
                "Cats purr. Dogs bark loudly. Birds sing.",
                &dir.path().join("i.bin"),
                &dir.path().join("c.json"),
            )
            .await
            .unwrap();

        let hits = pipeline.search("dogs bark", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].position, 1);
        assert_eq!(hits[0].text, "Dogs bark loudly.");
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_rebuild_replaces_artifact() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("i.bin");
        let chunks_path = dir.path().join("c.json");
        let mut pipeline = pipeline();

        pipeline
            .load_or_build("First corpus.", &index_path, &chunks_path)
            .await
            .unwrap();
        pipeline
            .rebuild("Second corpus. With two sentences.", &index_path, &chunks_path)
            .await
            .unwrap();
        assert_eq!(pipeline.len(), 2);

        let mut fresh = self::pipeline();
        let outcome = fresh
            .load_or_build("ignored", &index_path, &chunks_path)
            .await
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Loaded);
        assert_eq!(fresh.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_artifact() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("i.bin");
        let chunks_path = dir.path().join("c.json");
        let mut pipeline = pipeline();

        pipeline
            .load_or_build("First corpus. Still here.", &index_path, &chunks_path)
            .await
            .unwrap();
        let result = pipeline.rebuild(" \n ", &index_path, &chunks_path).await;

        assert!(matches!(result, Err(RetrieverError::EmptyCorpus)));
        assert!(pipeline.is_ready());
        assert_eq!(pipeline.len(), 2);
        let mut fresh = self::pipeline();
        let outcome = fresh
            .load_or_build("", &index_path, &chunks_path)
            .await
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Loaded);
        assert_eq!(fresh.len(), 2);
    }

    #[tokio::test]
    async fn test_discard_removes_artifact() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("i.bin");
        let chunks_path = dir.path().join("c.json");
        let mut pipeline = pipeline();
        pipeline
            .load_or_build("One sentence.", &index_path, &chunks_path)
            .await
            .unwrap();

        pipeline.discard(&index_path, &chunks_path).unwrap();

        assert!(!pipeline.is_ready());
        assert!(!index_path.exists());
        assert!(!chunks_path.exists());
        // Discarding twice is fine
        pipeline.discard(&index_path, &chunks_path).unwrap();
    }

    #[tokio::test]
    async fn test_from_config_backend() {
        let dir = tempdir().unwrap();
        let embedder = Embedder::from_config(&EmbedConfig::hashing(16)).await.unwrap();
        let mut pipeline = RetrievalPipeline::new(Arc::new(Segmenter::default()), embedder);

        pipeline
            .load_or_build("Hello there.", &dir.path().join("i.bin"), &dir.path().join("c.json"))
            .await
            .unwrap();
        assert_eq!(pipeline.dimension(), Some(16));
    }
}
