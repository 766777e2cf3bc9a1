//! Turning retrieved context into an answer.
//!
//! The retrieval core only hands over the question and its context; how an
//! answer is produced is behind [`AnswerSynthesizer`].

use crate::config::SynthesisConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based on the provided context from PDF documents. \
If the answer is not found in the context, say 'I could not find an answer to that in the provided documents.' \
Be concise and directly answer the question based on the information given.";

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("API key variable {var} is not set")]
    MissingApiKey { var: String },

    #[error("Chat completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chat completion returned no answer")]
    EmptyResponse,
}

#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    /// Answer `question` from `contexts`, which is never empty.
    async fn synthesize(&self, question: &str, contexts: &[String]) -> Result<String, SynthesisError>;
}

/// Offline synthesizer that answers with the retrieved context itself
#[derive(Debug, Clone, Default)]
pub struct ContextOnlySynthesizer;

#[async_trait]
impl AnswerSynthesizer for ContextOnlySynthesizer {
    async fn synthesize(&self, _question: &str, contexts: &[String]) -> Result<String, SynthesisError> {
        Ok(contexts.join(" "))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Clone)]
pub struct ChatCompletionSynthesizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl std::fmt::Debug for ChatCompletionSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionSynthesizer")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionSynthesizer {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            temperature,
        }
    }

    /// Like [`new`](Self::new), reading the API key from `api_key_env`.
    pub fn from_env(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key_env: &str,
        temperature: f32,
    ) -> Result<Self, SynthesisError> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| SynthesisError::MissingApiKey {
                var: api_key_env.to_string(),
            })?;
        Ok(Self::new(base_url, model, api_key, temperature))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn request<'a>(&'a self, question: &str, contexts: &[String]) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!(
                        "Context from PDF documents:\n{}\n\nQuestion: {}",
                        contexts.join(" "),
                        question
                    ),
                },
            ],
        }
    }
}

#[async_trait]
impl AnswerSynthesizer for ChatCompletionSynthesizer {
    async fn synthesize(&self, question: &str, contexts: &[String]) -> Result<String, SynthesisError> {
        tracing::debug!("Requesting answer from {} ({})", self.endpoint(), self.model);
        let response: ChatResponse = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.request(question, contexts))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|answer| !answer.is_empty())
            .ok_or(SynthesisError::EmptyResponse)
    }
}

/// Create the synthesizer described by `config`.
pub fn create_synthesizer(config: &SynthesisConfig) -> Result<Arc<dyn AnswerSynthesizer>, SynthesisError> {
    match config {
        SynthesisConfig::ContextOnly => Ok(Arc::new(ContextOnlySynthesizer)),
        SynthesisConfig::ChatCompletion {
            base_url,
            model,
            api_key_env,
            temperature,
        } => Ok(Arc::new(ChatCompletionSynthesizer::from_env(
            base_url.as_str(),
            model.as_str(),
            api_key_env,
            *temperature,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_context_only_joins_with_spaces() {
        let contexts = vec!["First.".to_string(), "Second.".to_string()];
        let answer = ContextOnlySynthesizer
            .synthesize("ignored", &contexts)
            .await
            .unwrap();
        assert_eq!(answer, "First. Second.");
    }

    #[test]
    fn test_chat_request_body() {
        let synthesizer =
            ChatCompletionSynthesizer::new("https://example.invalid/v1/", "some-model", "key", 0.2);
        let contexts = vec!["RBI is the central bank.".to_string()];
        let body = serde_json::to_value(synthesizer.request("What is RBI?", &contexts)).unwrap();

        assert_eq!(synthesizer.endpoint(), "https://example.invalid/v1/chat/completions");
        assert_eq!(body["model"], "some-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(
            body["messages"][1]["content"],
            "Context from PDF documents:\nRBI is the central bank.\n\nQuestion: What is RBI?"
        );
    }

    #[test]
    fn test_chat_response_parsing() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":" Answer. "}}]}"#,
        )
        .unwrap();
        assert_eq!(response.choices[0].message.content, " Answer. ");
    }

    #[test]
    fn test_missing_api_key() {
        let result = ChatCompletionSynthesizer::from_env(
            "https://example.invalid/v1",
            "m",
            "DOCQA_TEST_KEY_THAT_IS_NEVER_SET",
            0.2,
        );
        assert!(matches!(result, Err(SynthesisError::MissingApiKey { .. })));
    }

    #[test]
    fn test_create_default_synthesizer() {
        assert!(create_synthesizer(&SynthesisConfig::ContextOnly).is_ok());
    }
}
