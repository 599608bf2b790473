//! services/engine/src/adapters/quiz_llm.rs
//!
//! This module contains the adapter for the quiz-generating LLM.
//! It implements the `QuizService` port from the `core` crate. The model is
//! asked for JSON matching the `QuizQuestion` schema; anything that fails to
//! parse or validate is a gateway-level failure, never passed through.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use studyforge_core::{
    domain::{truncate_chars, QuizQuestion},
    ports::{PortError, PortResult, QuizService},
};

use crate::retry::{with_retry, RetryConfig};

const SYSTEM_INSTRUCTIONS: &str = r#"You are a quiz author. Create 8 quiz questions testing understanding of the provided study material.

Respond with ONLY a JSON array, no prose and no code fences. Each element must be one of:
  {"type": "multiple_choice", "prompt": "...", "options": ["...", "...", "...", "..."], "answer_index": 0}
  {"type": "short_answer", "prompt": "...", "reference_answer": "..."}

Rules:
- "answer_index" is the zero-based index of the correct option.
- Mix both question types.
- Every question must be answerable from the material alone."#;

/// Parses and validates the model's reply into typed questions.
fn parse_quiz(raw: &str) -> PortResult<Vec<QuizQuestion>> {
    let body = super::strip_code_fences(raw);
    let questions: Vec<QuizQuestion> = serde_json::from_str(body)
        .map_err(|e| PortError::InvalidResponse(format!("quiz JSON did not parse: {e}")))?;

    if questions.is_empty() {
        return Err(PortError::InvalidResponse(
            "quiz contained no questions".to_string(),
        ));
    }
    for question in &questions {
        if let QuizQuestion::MultipleChoice {
            options,
            answer_index,
            ..
        } = question
        {
            if options.len() < 2 {
                return Err(PortError::InvalidResponse(
                    "multiple-choice question has fewer than two options".to_string(),
                ));
            }
            if *answer_index >= options.len() {
                return Err(PortError::InvalidResponse(format!(
                    "answer_index {} out of range for {} options",
                    answer_index,
                    options.len()
                )));
            }
        }
    }
    Ok(questions)
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `QuizService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiQuizAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    max_source_chars: usize,
    retry: RetryConfig,
}

impl OpenAiQuizAdapter {
    /// Creates a new `OpenAiQuizAdapter`.
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
// `QuizService` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuizService for OpenAiQuizAdapter {
    async fn generate_quiz(&self, source_text: &str) -> PortResult<Vec<QuizQuestion>> {
        let bounded = truncate_chars(source_text, self.max_source_chars);
        let user_input = format!("Write the quiz for this material:\n\n{}", bounded);

        // The retry wraps only the network call; a schema failure inside
        // `parse_quiz` is terminal and surfaces unretried.
        let raw = with_retry(&self.retry, "generate_quiz", || {
            super::chat_complete(&self.client, &self.model, SYSTEM_INSTRUCTIONS, &user_input)
        })
        .await?;

        parse_quiz(&raw)
    }
}
