//! services/engine/src/adapters/explain_llm.rs
//!
//! This module contains the adapter for the explanation-generating LLM.
//! It implements the `ExplanationService` port from the `core` crate.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use studyforge_core::{
    domain::truncate_chars,
    ports::{ExplanationService, PortResult},
};

use crate::retry::{with_retry, RetryConfig};

const SYSTEM_INSTRUCTIONS: &str = "You are an expert tutor. Explain the provided study material \
thoroughly but accessibly: define key terms, walk through the central ideas in order, and use \
concrete examples where they help. Write flowing prose with short paragraphs. Do not add a \
preamble or closing remarks; respond with the explanation only.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ExplanationService` using an OpenAI-compatible
/// LLM.
#[derive(Clone)]
pub struct OpenAiExplainAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    max_source_chars: usize,
    retry: RetryConfig,
}

impl OpenAiExplainAdapter {
    /// Creates a new `OpenAiExplainAdapter`. `max_source_chars` bounds how
    /// much of the source text is submitted, to bound cost and latency.
    pub fn new(client: Client<OpenAIConfig>, model: String, max_source_chars: usize) -> Self {
        Self {
            client,
            model,
            max_source_chars,
            retry: RetryConfig::default(),
        }
    }
}

//=========================================================================================
// `ExplanationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ExplanationService for OpenAiExplainAdapter {
    async fn generate_explanation(&self, source_text: &str) -> PortResult<String> {
        let bounded = truncate_chars(source_text, self.max_source_chars);
        let user_input = format!("Explain this study material:\n\n{}", bounded);

        let text = with_retry(&self.retry, "generate_explanation", || {
            super::chat_complete(&self.client, &self.model, SYSTEM_INSTRUCTIONS, &user_input)
        })
        .await?;

        Ok(text.trim().to_string())
    }
}
