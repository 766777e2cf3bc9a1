//! HuggingFace model downloading functionality

use crate::config::{BackendKind, EmbedConfig};
use crate::error::{EmbedError, Result};
use hf_hub::api::tokio::{Api, ApiRepo};
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Downloads ONNX models and their tokenizer files from HuggingFace Hub
pub struct ModelDownloader {
    api: Api,
}

impl ModelDownloader {
    /// Create a new model downloader.
    ///
    /// Authentication uses the token from the environment or the local
    /// HuggingFace cache, if any.
    ///
    /// # Errors
    /// Returns [`EmbedError::ModelInitialization`] if the API client cannot be built.
    pub fn new() -> Result<Self> {
        let api = Api::new().map_err(EmbedError::model_init)?;
        Ok(Self { api })
    }

    /// Download a model from HuggingFace Hub if not already present locally.
    ///
    /// Every file is fetched into the hub cache and then copied into
    /// `config.model_path()`, where the backend loads it from. Files already
    /// present are left alone. Configurations for other backends are a no-op.
    ///
    /// # Errors
    /// - Network or HuggingFace API errors for required files
    /// - File system errors when creating directories or writing files
    pub async fn ensure_model(&self, config: &EmbedConfig) -> Result<()> {
        let Some(repo_id) = config.hf_repo() else {
            tracing::debug!("Not a HuggingFace model, skipping download");
            return Ok(());
        };

        if Self::is_model_complete(config) {
            tracing::info!("Model {} already exists and is complete", config.model_name);
            return Ok(());
        }

        tracing::info!(
            "Downloading model {} from {}@{}",
            config.model_name,
            repo_id,
            config.hf_revision()
        );

        fs::create_dir_all(config.model_path()).await?;

        let repo = self.api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Model,
            config.hf_revision().to_string(),
        ));

        self.download_model_files(&repo, config).await?;

        tracing::info!("Model {} downloaded successfully", config.model_name);
        Ok(())
    }

    /// Remote path and local destination of every file the model needs
    fn required_files(config: &EmbedConfig) -> Vec<(String, PathBuf)> {
        let tokenizer_config = config.tokenizer_config();
        let mut files = Vec::new();

        if let (Some(onnx_path), BackendKind::HuggingFace { onnx_file, .. }) =
            (config.onnx_model_path(), &config.backend)
        {
            files.push((onnx_file.clone(), onnx_path));
        }

        files.push(("tokenizer.json".to_string(), tokenizer_config.tokenizer_path));
        files.push(("config.json".to_string(), tokenizer_config.config_path));
        files.push((
            "special_tokens_map.json".to_string(),
            tokenizer_config.special_tokens_map_path,
        ));
        files
    }

    /// Check if the model is completely downloaded
    fn is_model_complete(config: &EmbedConfig) -> bool {
        Self::required_files(config).iter().all(|(_, path)| {
            let exists = path.exists();
            if !exists {
                tracing::debug!("Missing file: {}", path.display());
            }
            exists
        })
    }

    /// Download all required model files
    async fn download_model_files(&self, repo: &ApiRepo, config: &EmbedConfig) -> Result<()> {
        let mut downloads = Self::required_files(config);

        if let Some(path) = config.tokenizer_config().tokenizer_config_path {
            downloads.push(("tokenizer_config.json".to_string(), path));
        }

        for (remote_path, local_path) in &downloads {
            if local_path.exists() {
                tracing::debug!("File already exists: {}", local_path.display());
                continue;
            }

            if let Some(parent) = local_path.parent() {
                fs::create_dir_all(parent).await?;
            }

            tracing::info!("Downloading {} to {}", remote_path, local_path.display());

            match repo.get(remote_path).await {
                Ok(cached_path) => {
                    fs::copy(&cached_path, local_path).await?;
                    tracing::debug!("Successfully downloaded {}", remote_path);
                }
                Err(e) => {
                    tracing::warn!("Failed to download {}: {}", remote_path, e);
                    match remote_path.as_str() {
                        "special_tokens_map.json" => {
                            Self::create_fallback_special_tokens_map(local_path).await?;
                        }
                        "tokenizer_config.json" => {
                            // The backend generates a minimal one
                            tracing::info!(
                                "tokenizer_config.json not found, will generate minimal config"
                            );
                        }
                        _ => return Err(EmbedError::model_init(e)),
                    }
                }
            }
        }

        Ok(())
    }

    /// Create a fallback special tokens map if the repository has none
    async fn create_fallback_special_tokens_map(path: &Path) -> Result<()> {
        let fallback_content = serde_json::json!({
            "cls_token": "[CLS]",
            "sep_token": "[SEP]",
            "unk_token": "[UNK]",
            "pad_token": "[PAD]",
            "mask_token": "[MASK]"
        });

        let content = serde_json::to_string_pretty(&fallback_content)
            .map_err(|e| EmbedError::External { source: e.into() })?;

        fs::write(path, content).await?;
        tracing::info!("Created fallback special_tokens_map.json");
        Ok(())
    }
}

/// Download the files for `config` if it names a HuggingFace model.
pub async fn download_model(config: &EmbedConfig) -> Result<()> {
    if !config.is_huggingface_model() {
        return Ok(());
    }
    ModelDownloader::new()?.ensure_model(config).await
}
