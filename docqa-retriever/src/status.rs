//! Status reporting for configured language spaces.
//!
//! Reports are built from configuration and artifact headers only, so checking
//! status never loads a model or reads vector data.

use crate::config::{RetrieverConfig, SpaceConfig};
use crate::error::ArtifactError;
use crate::retrieval::router::Script;
use crate::storage::{ArtifactInfo, IndexStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ArtifactState {
    /// Both files present and readable
    Present,
    /// Not built yet
    Missing { path: PathBuf },
    /// Unreadable; the next build replaces it
    Corrupt { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SpaceStatus {
    pub name: String,
    pub script: Script,
    pub backend_id: String,
    pub index_path: PathBuf,
    pub chunks_path: PathBuf,
    pub artifact: ArtifactState,
    pub info: Option<ArtifactInfo>,
    /// Whether the stored index was built by the configured backend
    pub backend_matches: Option<bool>,
}

impl SpaceStatus {
    pub fn health(&self) -> HealthStatus {
        match (&self.artifact, self.backend_matches) {
            (ArtifactState::Present, Some(true)) => HealthStatus::Healthy,
            (ArtifactState::Corrupt { .. }, _) => HealthStatus::Critical,
            _ => HealthStatus::Warning,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Unix timestamp of report creation
    pub generated_at: i64,
    pub data_dir: PathBuf,
    pub top_k: usize,
    pub spaces: Vec<SpaceStatus>,
    pub overall_status: HealthStatus,
}

pub fn space_status(config: &RetrieverConfig, space: &SpaceConfig) -> SpaceStatus {
    let index_path = config.index_path(space);
    let chunks_path = config.chunks_path(space);
    let backend_id = space.embedding.backend_id();

    let (artifact, info) = match IndexStore::inspect(&index_path, &chunks_path) {
        Ok(info) => (ArtifactState::Present, Some(info)),
        Err(ArtifactError::NotFound { path }) => (ArtifactState::Missing { path }, None),
        Err(ArtifactError::Corrupt { reason, .. }) => (ArtifactState::Corrupt { reason }, None),
    };
    let backend_matches = info
        .as_ref()
        .map(|info| info.backend_digest == blake3::hash(backend_id.as_bytes()).to_hex().as_str());

    SpaceStatus {
        name: space.name.clone(),
        script: space.script,
        backend_id,
        index_path,
        chunks_path,
        artifact,
        info,
        backend_matches,
    }
}

pub fn collect_status(config: &RetrieverConfig) -> StatusReport {
    let spaces: Vec<SpaceStatus> = config
        .spaces
        .iter()
        .map(|space| space_status(config, space))
        .collect();

    let overall_status = spaces
        .iter()
        .map(SpaceStatus::health)
        .fold(HealthStatus::Healthy, |worst, health| match (worst, health) {
            (HealthStatus::Critical, _) | (_, HealthStatus::Critical) => HealthStatus::Critical,
            (HealthStatus::Warning, _) | (_, HealthStatus::Warning) => HealthStatus::Warning,
            _ => HealthStatus::Healthy,
        });

    StatusReport {
        generated_at: chrono::Utc::now().timestamp(),
        data_dir: config.data_dir.clone(),
        top_k: config.top_k,
        spaces,
        overall_status,
    }
}
