//! Question answering on top of retrieval.
//!
//! The assistant never fails a question: routing and retrieval problems become
//! one of the plain messages below and synthesis is skipped.

use crate::context::RetrieverContext;
use crate::error::RetrieverError;
use crate::retrieval::router::{Route, Script, UNSUPPORTED_LANGUAGE_MESSAGE, detect_script};
use crate::synthesis::AnswerSynthesizer;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

pub const NO_CONTEXT_MESSAGE: &str = "Could not find relevant context for your query.";
pub const NO_CONTENT_MESSAGE: &str = "No content available to search.";

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub script: Script,
    /// Name of the space that served the question
    pub space: Option<String>,
    pub contexts: Vec<String>,
    pub text: String,
}

pub struct Assistant {
    context: RetrieverContext,
    synthesizer: Arc<dyn AnswerSynthesizer>,
}

impl Assistant {
    pub fn new(context: RetrieverContext, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        Self {
            context,
            synthesizer,
        }
    }

    pub fn context(&self) -> &RetrieverContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RetrieverContext {
        &mut self.context
    }

    pub async fn ask(&self, question: &str) -> Answer {
        let script = detect_script(question);
        let mut answer = Answer {
            question: question.to_string(),
            script,
            space: None,
            contexts: Vec::new(),
            text: String::new(),
        };

        let space = match self.context.router().route(question) {
            Route::Space(space) => space,
            Route::Unsupported => {
                answer.text = UNSUPPORTED_LANGUAGE_MESSAGE.to_string();
                return answer;
            }
        };
        answer.space = Some(space.name.clone());

        if space.pipeline.is_ready() && space.pipeline.is_empty() {
            answer.text = NO_CONTENT_MESSAGE.to_string();
            return answer;
        }

        let contexts = match space
            .pipeline
            .get_relevant_context(question, self.context.top_k())
            .await
        {
            Ok(contexts) => contexts,
            Err(RetrieverError::QueryEmpty) => Vec::new(),
            Err(e) => {
                warn!("Retrieval failed in space '{}': {}", space.name, e);
                Vec::new()
            }
        };

        if contexts.iter().all(|c| c.trim().is_empty()) {
            answer.text = NO_CONTEXT_MESSAGE.to_string();
            return answer;
        }

        answer.text = match self.synthesizer.synthesize(question, &contexts).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Answer synthesis failed: {}", e);
                format!("Error generating response: {e}")
            }
        };
        answer.contexts = contexts;
        answer
    }
}
