//! Embedding backend trait and the fastembed implementation

use crate::config::{BackendKind, EmbedConfig};
use crate::downloader::download_model;
use crate::error::{EmbedError, Result};
use crate::hashing::HashingBackend;
use async_trait::async_trait;
use fastembed::{
    EmbeddingModel, InitOptions, InitOptionsUserDefined, Pooling, TextEmbedding, TokenizerFiles,
    UserDefinedEmbeddingModel,
};
use std::sync::{Arc, Mutex};
use tokio::fs;

/// A fixed-length embedding vector.
pub type Vector = Vec<f32>;

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vector>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result; the dimension is taken from the first vector
    /// and is 0 for an empty result.
    pub fn new(embeddings: Vec<Vector>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Capability interface for anything that turns text into vectors.
///
/// Implementations tokenize with truncation to the configured maximum length and
/// mean-pool token states into one vector. They are deterministic: the same text
/// always yields the same vector. Inputs arrive already normalized by
/// [`crate::Embedder`].
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for multiple texts, in input order
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Generate the embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vector> {
        let texts = vec![text.to_string()];
        let result = self.embed_texts(&texts).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::invalid_config("No embedding generated for text"))
    }

    /// Dimension of the vectors this backend produces
    fn dimension(&self) -> usize;

    /// Identity of the vector space, see [`EmbedConfig::backend_id`]
    fn backend_id(&self) -> &str;
}

/// Create and initialize the backend described by `config`.
///
/// This is the single place where backends are constructed; any failure here
/// means the backend is unavailable and should stop startup.
pub async fn create_backend(config: &EmbedConfig) -> Result<Arc<dyn EmbeddingBackend>> {
    config.check()?;
    match &config.backend {
        BackendKind::Hashing { dimension } => Ok(Arc::new(HashingBackend::new(
            *dimension,
            config.max_length,
            config.backend_id(),
        )?)),
        BackendKind::HuggingFace { .. } | BackendKind::Builtin { .. } => {
            Ok(Arc::new(FastEmbedBackend::create(config.clone()).await?))
        }
    }
}

/// FastEmbed-based backend running ONNX models locally
#[derive(Clone)]
pub struct FastEmbedBackend {
    config: EmbedConfig,
    model: Arc<Mutex<TextEmbedding>>,
    dimension: usize,
    backend_id: String,
}

impl std::fmt::Debug for FastEmbedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedBackend")
            .field("config", &self.config)
            .field("dimension", &self.dimension)
            .field("backend_id", &self.backend_id)
            .finish()
    }
}

impl FastEmbedBackend {
    /// Download (if needed), load and validate the model.
    ///
    /// # Errors
    /// Fails if the files cannot be fetched, the model cannot be loaded, or a
    /// probe embedding is empty or contains non-finite values.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        tracing::info!("Initializing FastEmbed backend for model: {}", config.model_name);

        let (model, dimension) = match &config.backend {
            BackendKind::HuggingFace { .. } => {
                download_model(&config).await?;
                Self::load_user_defined_model(&config).await?
            }
            BackendKind::Builtin { model } => {
                Self::load_builtin_model(&config, builtin_model(model)?).await?
            }
            BackendKind::Hashing { .. } => {
                return Err(EmbedError::invalid_config(
                    "hashing configuration passed to FastEmbedBackend",
                ));
            }
        };

        let backend = Self {
            backend_id: config.backend_id(),
            config,
            model: Arc::new(Mutex::new(model)),
            dimension,
        };
        backend.validate_model().await?;
        Ok(backend)
    }

    async fn load_builtin_model(
        config: &EmbedConfig,
        model_kind: EmbeddingModel,
    ) -> Result<(TextEmbedding, usize)> {
        let init_options = InitOptions::new(model_kind)
            .with_max_length(config.max_length)
            .with_cache_dir(config.model_base_path.clone())
            .with_show_download_progress(false);
        let model_name = config.model_name.clone();

        tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
            tracing::info!("Loading built-in embedding model: {}", model_name);
            let model =
                TextEmbedding::try_new(init_options).map_err(|e| EmbedError::External { source: e })?;
            probe_dimension(model)
        })
        .await?
    }

    /// Load a user-defined ONNX model from downloaded HuggingFace files
    async fn load_user_defined_model(config: &EmbedConfig) -> Result<(TextEmbedding, usize)> {
        tracing::info!("Loading user-defined model: {}", config.model_name);

        let onnx_path = config
            .onnx_model_path()
            .ok_or_else(|| EmbedError::invalid_config("No ONNX file for this backend"))?;
        let onnx_file = fs::read(&onnx_path).await?;

        let tokenizer_config = config.tokenizer_config();
        let tokenizer_file = fs::read(&tokenizer_config.tokenizer_path).await?;
        let config_file = fs::read(&tokenizer_config.config_path).await?;
        let special_tokens_map_file = fs::read(&tokenizer_config.special_tokens_map_path).await?;

        let tokenizer_config_file = match &tokenizer_config.tokenizer_config_path {
            Some(path) if path.exists() => fs::read(path).await?,
            _ => minimal_tokenizer_config(config.max_length)?,
        };

        let tokenizer_files = TokenizerFiles {
            tokenizer_file,
            config_file,
            special_tokens_map_file,
            tokenizer_config_file,
        };

        let user_model =
            UserDefinedEmbeddingModel::new(onnx_file, tokenizer_files).with_pooling(Pooling::Mean);
        let init_options = InitOptionsUserDefined::new().with_max_length(config.max_length);
        let model_name = config.model_name.clone();

        tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
            tracing::info!("Initializing user-defined model: {}", model_name);
            let model = TextEmbedding::try_new_from_user_defined(user_model, init_options)
                .map_err(|e| EmbedError::External { source: e })?;
            probe_dimension(model)
        })
        .await?
    }

    /// Validate that the model produces finite vectors of the probed dimension
    async fn validate_model(&self) -> Result<()> {
        let embedding = self.embed_text("validation test").await?;

        if embedding.is_empty() {
            return Err(EmbedError::invalid_config(
                "Model validation failed: empty embedding",
            ));
        }

        if embedding.len() != self.dimension {
            return Err(EmbedError::invalid_config(format!(
                "Model validation failed: expected dimension {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        if embedding.iter().any(|value| !value.is_finite()) {
            return Err(EmbedError::invalid_config(
                "Model validation failed: non-finite values in embedding",
            ));
        }

        tracing::debug!("Model validation passed for: {}", self.config.model_name);
        Ok(())
    }
}

#[async_trait]
impl EmbeddingBackend for FastEmbedBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        let batch = texts.to_vec();
        let model = Arc::clone(&self.model);
        let batch_size = self.config.batch_size;

        let embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vector>> {
            tracing::debug!("Processing batch of {} texts", batch.len());
            let mut model_guard = model.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            model_guard
                .embed(batch, Some(batch_size))
                .map_err(|e| EmbedError::External { source: e })
        })
        .await??;

        if embeddings.len() != texts.len() {
            return Err(EmbedError::invalid_config(format!(
                "Model returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }

        Ok(EmbeddingResult::new(embeddings))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn backend_id(&self) -> &str {
        &self.backend_id
    }
}

/// Map a short built-in model name to fastembed's model enum
fn builtin_model(name: &str) -> Result<EmbeddingModel> {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "paraphrase-multilingual-mpnet-base-v2" => Ok(EmbeddingModel::ParaphraseMLMpnetBaseV2),
        "multilingual-e5-small" => Ok(EmbeddingModel::MultilingualE5Small),
        other => Err(EmbedError::invalid_config(format!(
            "Unknown built-in model: {other}"
        ))),
    }
}

/// Embed a probe text to learn the model's output dimension
fn probe_dimension(mut model: TextEmbedding) -> Result<(TextEmbedding, usize)> {
    let probe = model
        .embed(vec!["test".to_string()], None)
        .map_err(|e| EmbedError::External { source: e })?;
    let dimension = probe
        .first()
        .map(|emb| emb.len())
        .ok_or_else(|| EmbedError::invalid_config("Model produced no probe embedding"))?;

    tracing::info!("Model loaded successfully. Dimension: {}", dimension);
    Ok((model, dimension))
}

fn minimal_tokenizer_config(max_length: usize) -> Result<Vec<u8>> {
    let minimal_config = serde_json::json!({
        "clean_up_tokenization_spaces": true,
        "do_lower_case": false,
        "model_max_length": max_length,
        "tokenizer_class": "BertTokenizer"
    });
    serde_json::to_vec_pretty(&minimal_config).map_err(|e| EmbedError::External { source: e.into() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_result() {
        let result = EmbeddingResult::new(vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);

        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 3);
        assert!(!result.is_empty());
        assert_eq!(EmbeddingResult::new(vec![]).dimension, 0);
    }

    #[test]
    fn test_builtin_model_names() {
        assert!(matches!(
            builtin_model("all-MiniLM-L6-v2"),
            Ok(EmbeddingModel::AllMiniLML6V2)
        ));
        assert!(matches!(
            builtin_model("paraphrase-multilingual-mpnet-base-v2"),
            Ok(EmbeddingModel::ParaphraseMLMpnetBaseV2)
        ));
        assert!(builtin_model("no-such-model").is_err());
    }

    #[test]
    fn test_minimal_tokenizer_config_uses_max_length() {
        let bytes = minimal_tokenizer_config(512).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["model_max_length"], 512);
    }

    #[tokio::test]
    async fn test_create_backend_hashing() -> Result<()> {
        let backend = create_backend(&EmbedConfig::hashing(32)).await?;

        assert_eq!(backend.dimension(), 32);
        assert_eq!(backend.backend_id(), "hashing:32;max_length=512");
        let vector = backend.embed_text("reserve bank").await?;
        assert_eq!(vector.len(), 32);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_backend_rejects_invalid_config() {
        let result = create_backend(&EmbedConfig::hashing(0)).await;
        assert!(matches!(result, Err(EmbedError::InvalidConfig { .. })));
    }

    #[tokio::test]
    #[ignore] // Downloads LaBSE from HuggingFace - run with: cargo test -p docqa-embed test_labse_download -- --ignored
    async fn test_labse_download_and_embedding() -> Result<()> {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();

        let temp_dir = tempfile::tempdir()?;
        let backend = FastEmbedBackend::create(EmbedConfig::labse(temp_dir.path())).await?;
        assert_eq!(backend.dimension(), 768);

        let texts = vec![
            "भारतीय रिज़र्व बैंक".to_string(),
            "reserve bank of india".to_string(),
        ];
        let result = backend.embed_texts(&texts).await?;
        assert_eq!(result.len(), 2);
        assert!(result.embeddings.iter().flatten().all(|x| x.is_finite()));

        // Deterministic inference
        let again = backend.embed_text(&texts[0]).await?;
        assert_eq!(again, result.embeddings[0]);
        Ok(())
    }
}
