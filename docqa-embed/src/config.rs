//! Configuration for embedding backends

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum number of tokens fed to a model; longer inputs are truncated.
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Default ONNX file inside a HuggingFace sentence-transformers repository.
pub const DEFAULT_ONNX_FILE: &str = "onnx/model.onnx";

/// Paths of the tokenizer files a user-defined ONNX model needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerConfig {
    /// Path to the tokenizer.json file
    pub tokenizer_path: PathBuf,
    /// Path to the config.json file
    pub config_path: PathBuf,
    /// Path to the special_tokens_map.json file
    pub special_tokens_map_path: PathBuf,
    /// Path to the tokenizer_config.json file (optional, will generate minimal if missing)
    pub tokenizer_config_path: Option<PathBuf>,
}

impl TokenizerConfig {
    /// Standard layout of tokenizer files in a model directory
    pub fn standard<P: AsRef<Path>>(model_dir: P) -> Self {
        let model_dir = model_dir.as_ref();
        Self {
            tokenizer_path: model_dir.join("tokenizer.json"),
            config_path: model_dir.join("config.json"),
            special_tokens_map_path: model_dir.join("special_tokens_map.json"),
            tokenizer_config_path: Some(model_dir.join("tokenizer_config.json")),
        }
    }

    /// Validate that all required tokenizer files exist
    pub fn validate(&self) -> Result<()> {
        let paths_to_check = [
            ("tokenizer", &self.tokenizer_path),
            ("config", &self.config_path),
            ("special tokens map", &self.special_tokens_map_path),
        ];

        for (name, path) in &paths_to_check {
            if !path.exists() {
                tracing::error!("Missing {}: {}", name, path.display());
                return Err(EmbedError::ModelFileNotFound {
                    path: path.to_path_buf(),
                });
            }
        }

        // tokenizer_config.json is optional
        if let Some(path) = &self.tokenizer_config_path {
            if !path.exists() {
                tracing::warn!(
                    "tokenizer_config.json not found at {}, will generate minimal config",
                    path.display()
                );
            }
        }

        tracing::debug!("Tokenizer validation successful");
        Ok(())
    }
}

/// Which implementation produces the vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BackendKind {
    /// An ONNX export on HuggingFace Hub, downloaded on first use and loaded as a
    /// user-defined fastembed model with mean pooling.
    HuggingFace {
        /// Repository id, e.g. `sentence-transformers/LaBSE`
        repo: String,
        /// Branch or commit
        #[serde(default = "default_revision")]
        revision: String,
        /// Path of the ONNX file inside the repository
        #[serde(default = "default_onnx_file")]
        onnx_file: String,
    },
    /// A model bundled with fastembed, selected by short name.
    Builtin {
        /// One of `all-minilm-l6-v2`, `paraphrase-multilingual-mpnet-base-v2`,
        /// `multilingual-e5-small`
        model: String,
    },
    /// Offline token hashing with mean pooling.
    Hashing {
        /// Number of hash buckets
        dimension: usize,
    },
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_onnx_file() -> String {
    DEFAULT_ONNX_FILE.to_string()
}

/// Configuration for one embedding backend
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct EmbedConfig {
    /// Directory that holds downloaded models
    #[builder(default = r#"PathBuf::from("models")"#)]
    #[serde(default = "default_model_base_path")]
    pub model_base_path: PathBuf,
    /// Name of the model, also the name of its directory under `model_base_path`
    pub model_name: String,
    /// Backend implementation and its parameters
    pub backend: BackendKind,
    /// Token truncation length
    #[builder(default = "DEFAULT_MAX_LENGTH")]
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Number of texts per backend call
    #[builder(default = "32")]
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Number of batches embedded concurrently during ingestion
    #[builder(default = "1")]
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_model_base_path() -> PathBuf {
    PathBuf::from("models")
}

fn default_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

fn default_batch_size() -> usize {
    32
}

fn default_max_concurrency() -> usize {
    1
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Configuration for a sentence-transformers ONNX export on HuggingFace
    pub fn from_huggingface<P: AsRef<Path>>(
        model_base_path: P,
        model_name: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            model_base_path: model_base_path.as_ref().to_path_buf(),
            model_name: model_name.into(),
            backend: BackendKind::HuggingFace {
                repo: repo.into(),
                revision: default_revision(),
                onnx_file: default_onnx_file(),
            },
            max_length: DEFAULT_MAX_LENGTH,
            // Smaller batches for the larger transformer models
            batch_size: 16,
            max_concurrency: 1,
        }
    }

    /// LaBSE, the multilingual model used for Devanagari text
    pub fn labse<P: AsRef<Path>>(model_base_path: P) -> Self {
        Self::from_huggingface(model_base_path, "LaBSE", "sentence-transformers/LaBSE")
    }

    /// all-mpnet-base-v2, the English model used for Latin-script text
    pub fn all_mpnet_base_v2<P: AsRef<Path>>(model_base_path: P) -> Self {
        Self::from_huggingface(
            model_base_path,
            "all-mpnet-base-v2",
            "sentence-transformers/all-mpnet-base-v2",
        )
    }

    /// A fastembed built-in model, cached under `model_base_path`
    pub fn builtin<P: AsRef<Path>>(model_base_path: P, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            model_base_path: model_base_path.as_ref().to_path_buf(),
            model_name: model.clone(),
            backend: BackendKind::Builtin { model },
            max_length: DEFAULT_MAX_LENGTH,
            batch_size: 32,
            max_concurrency: 1,
        }
    }

    /// The offline hashing backend with `dimension` buckets
    pub fn hashing(dimension: usize) -> Self {
        Self {
            model_base_path: default_model_base_path(),
            model_name: format!("hashing-{dimension}"),
            backend: BackendKind::Hashing { dimension },
            max_length: DEFAULT_MAX_LENGTH,
            batch_size: 64,
            max_concurrency: 1,
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set the number of concurrent batches (builder style)
    pub fn with_max_concurrency(self, max_concurrency: usize) -> Self {
        Self {
            max_concurrency,
            ..self
        }
    }

    /// Set the HuggingFace revision (builder style). Ignored by other backends.
    pub fn with_revision<S: Into<String>>(mut self, new_revision: S) -> Self {
        if let BackendKind::HuggingFace { revision, .. } = &mut self.backend {
            *revision = new_revision.into();
        }
        self
    }

    /// Get the full path to the model directory
    pub fn model_path(&self) -> PathBuf {
        self.model_base_path.join(&self.model_name)
    }

    /// Get the path to the ONNX model file of a HuggingFace model
    pub fn onnx_model_path(&self) -> Option<PathBuf> {
        match &self.backend {
            BackendKind::HuggingFace { onnx_file, .. } => Some(self.model_path().join(onnx_file)),
            _ => None,
        }
    }

    /// Tokenizer files, laid out in the model directory
    pub fn tokenizer_config(&self) -> TokenizerConfig {
        TokenizerConfig::standard(self.model_path())
    }

    /// Check if this is a HuggingFace model
    pub fn is_huggingface_model(&self) -> bool {
        matches!(self.backend, BackendKind::HuggingFace { .. })
    }

    /// Get the HuggingFace repository name
    pub fn hf_repo(&self) -> Option<&str> {
        match &self.backend {
            BackendKind::HuggingFace { repo, .. } => Some(repo),
            _ => None,
        }
    }

    /// Get the HuggingFace revision
    pub fn hf_revision(&self) -> &str {
        match &self.backend {
            BackendKind::HuggingFace { revision, .. } => revision,
            _ => "main",
        }
    }

    /// Stable identity of the vector space this configuration produces.
    ///
    /// Two configurations with the same identity produce interchangeable vectors;
    /// persisted indices record it so that an index is never reused under a
    /// different model.
    pub fn backend_id(&self) -> String {
        let source = match &self.backend {
            BackendKind::HuggingFace {
                repo,
                revision,
                onnx_file,
            } => format!("huggingface:{repo}@{revision}/{onnx_file}"),
            BackendKind::Builtin { model } => format!("builtin:{}", model.to_lowercase()),
            BackendKind::Hashing { dimension } => format!("hashing:{dimension}"),
        };
        format!("{source};max_length={}", self.max_length)
    }

    /// Check the settings for values no backend can work with
    pub fn check(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(EmbedError::invalid_config("max_length must be positive"));
        }
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be positive"));
        }
        if self.max_concurrency == 0 {
            return Err(EmbedError::invalid_config(
                "max_concurrency must be positive",
            ));
        }
        if let BackendKind::Hashing { dimension: 0 } = self.backend {
            return Err(EmbedError::invalid_config(
                "hashing dimension must be positive",
            ));
        }
        Ok(())
    }

    /// Validate that all required model files exist
    pub fn validate(&self) -> Result<()> {
        self.check()?;

        if let Some(onnx_path) = self.onnx_model_path() {
            if !onnx_path.exists() {
                tracing::error!("Missing ONNX model: {}", onnx_path.display());
                return Err(EmbedError::ModelFileNotFound { path: onnx_path });
            }
            self.tokenizer_config().validate()?;
        }

        tracing::debug!("Model validation successful for: {}", self.model_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_huggingface_presets() {
        let temp_dir = tempdir().unwrap();
        let labse = EmbedConfig::labse(temp_dir.path());

        assert_eq!(labse.model_name, "LaBSE");
        assert!(labse.is_huggingface_model());
        assert_eq!(labse.hf_repo(), Some("sentence-transformers/LaBSE"));
        assert_eq!(labse.hf_revision(), "main");
        assert_eq!(labse.max_length, 512);
        assert_eq!(labse.batch_size, 16);
        assert_eq!(
            labse.onnx_model_path(),
            Some(temp_dir.path().join("LaBSE").join("onnx").join("model.onnx"))
        );

        let mpnet = EmbedConfig::all_mpnet_base_v2(temp_dir.path()).with_revision("v1");
        assert_eq!(mpnet.hf_revision(), "v1");
        assert_ne!(labse.backend_id(), mpnet.backend_id());
    }

    #[test]
    fn test_tokenizer_paths_follow_model_dir() {
        let temp_dir = tempdir().unwrap();
        let config = EmbedConfig::labse(temp_dir.path());
        let tokenizer_config = config.tokenizer_config();
        let model_dir = temp_dir.path().join("LaBSE");

        assert_eq!(tokenizer_config.tokenizer_path, model_dir.join("tokenizer.json"));
        assert_eq!(tokenizer_config.config_path, model_dir.join("config.json"));
        assert_eq!(
            tokenizer_config.special_tokens_map_path,
            model_dir.join("special_tokens_map.json")
        );
        assert_eq!(
            tokenizer_config.tokenizer_config_path,
            Some(model_dir.join("tokenizer_config.json"))
        );
    }

    #[test]
    fn test_backend_id_includes_truncation() {
        let short = EmbedConfig::builder()
            .model_name("hashing-64")
            .backend(BackendKind::Hashing { dimension: 64 })
            .max_length(128usize)
            .build()
            .unwrap();
        let long = EmbedConfig::hashing(64);

        assert_eq!(long.backend_id(), "hashing:64;max_length=512");
        assert_eq!(short.backend_id(), "hashing:64;max_length=128");
    }

    #[test]
    fn test_builder_defaults() {
        let config = EmbedConfig::builder()
            .model_name("all-minilm-l6-v2")
            .backend(BackendKind::Builtin {
                model: "all-minilm-l6-v2".to_string(),
            })
            .build()
            .unwrap();

        assert_eq!(config.model_base_path, PathBuf::from("models"));
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.max_length, DEFAULT_MAX_LENGTH);
        assert!(config.onnx_model_path().is_none());
    }

    #[test]
    fn test_check_rejects_zero_values() {
        assert!(EmbedConfig::hashing(0).check().is_err());
        assert!(EmbedConfig::hashing(8).with_batch_size(0).check().is_err());
        assert!(
            EmbedConfig::hashing(8)
                .with_max_concurrency(0)
                .check()
                .is_err()
        );
        assert!(EmbedConfig::hashing(8).check().is_ok());
    }

    #[test]
    fn test_validate_reports_missing_onnx() {
        let temp_dir = tempdir().unwrap();
        let config = EmbedConfig::labse(temp_dir.path());

        match config.validate() {
            Err(EmbedError::ModelFileNotFound { path }) => {
                assert!(path.ends_with("onnx/model.onnx"));
            }
            other => panic!("expected ModelFileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_deserialize_from_toml_like_json() {
        let config: EmbedConfig = serde_json::from_str(
            r#"{
                "model_name": "LaBSE",
                "backend": { "kind": "hugging-face", "repo": "sentence-transformers/LaBSE" }
            }"#,
        )
        .unwrap();

        assert_eq!(config, EmbedConfig::labse("models").with_batch_size(32));
    }
}
