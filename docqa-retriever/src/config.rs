//! `docqa.toml` configuration.
//!
//! Every section is optional; a missing file yields the default two-space setup
//! (LaBSE for Devanagari, all-mpnet-base-v2 for Latin) with offline synthesis.
//!
//! ```toml
//! data_dir = "rag_cache"
//! top_k = 5
//!
//! [segmenter]
//! strip_patterns = ['(?m)^--- Page \d+ of .* ---$']
//!
//! [[spaces]]
//! name = "english"
//! script = "latin"
//! [spaces.embedding]
//! model_name = "hashing-256"
//! backend = { kind = "hashing", dimension = 256 }
//!
//! [synthesis]
//! kind = "chat-completion"
//! model = "llama-3.3-70b-versatile"
//! ```

use crate::error::{Result, RetrieverError};
use crate::retrieval::router::Script;
use docqa_context::SegmenterConfig;
use docqa_embed::EmbedConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "docqa.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Directory holding the index artifacts
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Corpus file or directory used when none is given on the command line
    #[serde(default)]
    pub corpus: Option<PathBuf>,
    /// Number of chunks retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default = "default_spaces")]
    pub spaces: Vec<SpaceConfig>,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// One language space: the script it serves and the model that embeds it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceConfig {
    pub name: String,
    pub script: Script,
    pub embedding: EmbedConfig,
    /// Index file name, relative to `data_dir` unless absolute
    #[serde(default)]
    pub index_file: Option<PathBuf>,
    /// Chunk file name, relative to `data_dir` unless absolute
    #[serde(default)]
    pub chunks_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SynthesisConfig {
    /// Return the retrieved context itself
    ContextOnly,
    /// Ask an OpenAI-compatible chat completion endpoint
    ChatCompletion {
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_chat_model")]
        model: String,
        /// Environment variable holding the API key
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_temperature")]
        temperature: f32,
    },
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self::ContextOnly
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_question_column")]
    pub question_column: String,
    #[serde(default = "default_response_column")]
    pub response_column: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            question_column: default_question_column(),
            response_column: default_response_column(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("rag_cache")
}

fn default_top_k() -> usize {
    crate::retrieval::pipeline::DEFAULT_TOP_K
}

fn default_spaces() -> Vec<SpaceConfig> {
    vec![
        SpaceConfig {
            name: "labse".to_string(),
            script: Script::Devanagari,
            embedding: EmbedConfig::labse("models"),
            index_file: None,
            chunks_file: None,
        },
        SpaceConfig {
            name: "mpnet".to_string(),
            script: Script::Latin,
            embedding: EmbedConfig::all_mpnet_base_v2("models"),
            index_file: None,
            chunks_file: None,
        },
    ]
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_chat_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_AI_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_question_column() -> String {
    "Questions".to_string()
}

fn default_response_column() -> String {
    "Responses".to_string()
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            corpus: None,
            top_k: default_top_k(),
            segmenter: SegmenterConfig::default(),
            spaces: default_spaces(),
            synthesis: SynthesisConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl RetrieverConfig {
    /// Read `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(
                "No configuration at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RetrieverError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RetrieverError::Config("top_k must be positive".to_string()));
        }
        if self.spaces.is_empty() {
            return Err(RetrieverError::Config(
                "at least one language space is required".to_string(),
            ));
        }
        let mut names = HashSet::new();
        let mut artifacts = HashSet::new();
        for space in &self.spaces {
            space
                .embedding
                .check()
                .map_err(|e| RetrieverError::Config(format!("space '{}': {}", space.name, e)))?;
            if !names.insert(space.name.as_str()) {
                return Err(RetrieverError::Config(format!(
                    "space '{}' is defined more than once",
                    space.name
                )));
            }
            // Index and chunk files share one namespace so no file can serve two roles
            for path in [self.index_path(space), self.chunks_path(space)] {
                if !artifacts.insert(path.clone()) {
                    return Err(RetrieverError::Config(format!(
                        "space '{}': artifact path {} is already used by another space",
                        space.name,
                        path.display()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn index_path(&self, space: &SpaceConfig) -> PathBuf {
        let file = space
            .index_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}_faiss.index", space.name)));
        self.data_dir.join(file)
    }

    pub fn chunks_path(&self, space: &SpaceConfig) -> PathBuf {
        let file = space
            .chunks_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}_content_chunks.json", space.name)));
        self.data_dir.join(file)
    }

    /// Offline configuration with one hashing space per script, for tests and demos.
    pub fn offline(data_dir: impl Into<PathBuf>, dimension: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            spaces: vec![
                SpaceConfig {
                    name: "hashing-devanagari".to_string(),
                    script: Script::Devanagari,
                    embedding: EmbedConfig::hashing(dimension),
                    index_file: None,
                    chunks_file: None,
                },
                SpaceConfig {
                    name: "hashing-latin".to_string(),
                    script: Script::Latin,
                    embedding: EmbedConfig::hashing(dimension),
                    index_file: None,
                    chunks_file: None,
                },
            ],
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_embed::BackendKind;

    #[test]
    fn test_defaults() {
        let config = RetrieverConfig::default();

        assert_eq!(config.top_k, 5);
        assert_eq!(config.spaces.len(), 2);
        assert_eq!(config.spaces[0].script, Script::Devanagari);
        assert_eq!(config.spaces[0].embedding, EmbedConfig::labse("models"));
        assert_eq!(config.synthesis, SynthesisConfig::ContextOnly);
        assert_eq!(config.batch.question_column, "Questions");
        assert_eq!(
            config.index_path(&config.spaces[0]),
            PathBuf::from("rag_cache/labse_faiss.index")
        );
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(
            RetrieverConfig::from_toml_str("").unwrap(),
            RetrieverConfig::default()
        );
    }

    #[test]
    fn test_parse_full_document() {
        let text = r#"
            data_dir = "cache"
            top_k = 3

            [segmenter]
            collapse_whitespace = false
            strip_patterns = ['^--- Page \d+ ---$']

            [[spaces]]
            name = "english"
            script = "latin"
            index_file = "en.index"

            [spaces.embedding]
            model_name = "hashing-32"
            backend = { kind = "hashing", dimension = 32 }

            [synthesis]
            kind = "chat-completion"
            model = "some-model"

            [batch]
            question_column = "Query"
        "#;
        let config = RetrieverConfig::from_toml_str(text).unwrap();

        assert_eq!(config.top_k, 3);
        assert!(!config.segmenter.collapse_whitespace);
        assert_eq!(config.spaces.len(), 1);
        assert_eq!(
            config.spaces[0].embedding.backend,
            BackendKind::Hashing { dimension: 32 }
        );
        assert_eq!(config.index_path(&config.spaces[0]), PathBuf::from("cache/en.index"));
        assert_eq!(
            config.chunks_path(&config.spaces[0]),
            PathBuf::from("cache/english_content_chunks.json")
        );
        assert_eq!(
            config.synthesis,
            SynthesisConfig::ChatCompletion {
                base_url: "https://api.groq.com/openai/v1".to_string(),
                model: "some-model".to_string(),
                api_key_env: "GROQ_AI_API_KEY".to_string(),
                temperature: 0.2,
            }
        );
        assert_eq!(config.batch.question_column, "Query");
        assert_eq!(config.batch.response_column, "Responses");
    }

    #[test]
    fn test_round_trip() {
        let config = RetrieverConfig::offline("cache", 64);
        let text = config.to_toml_string().unwrap();
        assert_eq!(RetrieverConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(RetrieverConfig::from_toml_str("top_k = 0").is_err());
        assert!(RetrieverConfig::from_toml_str("spaces = []").is_err());
        assert!(RetrieverConfig::from_toml_str("top_k = \"five\"").is_err());
    }

    #[test]
    fn test_rejects_duplicate_space_names() {
        let mut config = RetrieverConfig::offline("cache", 16);
        config.spaces[1].name = config.spaces[0].name.clone();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, RetrieverError::Config(_)));
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_rejects_shared_artifact_paths() {
        let mut config = RetrieverConfig::offline("cache", 16);
        config.spaces[1].index_file = Some(PathBuf::from("hashing-devanagari_faiss.index"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("already used by another space"));

        let mut config = RetrieverConfig::offline("cache", 16);
        config.spaces[0].chunks_file = Some(PathBuf::from("shared.json"));
        config.spaces[1].chunks_file = Some(PathBuf::from("shared.json"));
        assert!(config.validate().is_err());

        // An index file may not double as another space's chunk file either
        let mut config = RetrieverConfig::offline("cache", 16);
        config.spaces[1].index_file = Some(PathBuf::from("shared.json"));
        config.spaces[0].chunks_file = Some(PathBuf::from("shared.json"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_file_matches_defaults() {
        let config = RetrieverConfig::from_toml_str(include_str!("../../docqa.toml")).unwrap();
        assert_eq!(config, RetrieverConfig::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = RetrieverConfig::load(&dir.path().join("docqa.toml")).unwrap();
        assert_eq!(config, RetrieverConfig::default());
    }
}
