//! services/engine/src/adapters/notes_llm.rs
//!
//! This module contains the adapter for the note- and summary-generating LLM.
//! It implements the `NotesService` port from the `core` crate.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use studyforge_core::{
    domain::{truncate_chars, NoteLength},
    ports::{NotesService, PortResult},
};

use crate::retry::{with_retry, RetryConfig};

const NOTES_SYSTEM: &str = "You are a note-taking assistant. Produce clear, well-organized study \
notes from the provided material, using headings and bullet points. Respond with the notes only, \
no preamble.";

const SUMMARY_SYSTEM: &str = "You are a summarization assistant. Produce a short abstract of the \
provided material in at most four sentences. Respond with the summary only.";

/// The per-length shaping instruction appended to the notes prompt.
fn length_instruction(length: NoteLength) -> &'static str {
    match length {
        NoteLength::Short => {
            "Keep the notes brief: the five to eight most important points, one line each."
        }
        NoteLength::Medium => {
            "Produce a balanced set of notes: key points with one or two supporting details each."
        }
        NoteLength::Detailed => {
            "Produce thorough notes: cover every significant concept with supporting detail, \
             definitions, and examples."
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `NotesService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiNotesAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    max_source_chars: usize,
    retry: RetryConfig,
}

impl OpenAiNotesAdapter {
    /// Creates a new `OpenAiNotesAdapter`.
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
// `NotesService` Trait Implementation
//=========================================================================================

#[async_trait]
impl NotesService for OpenAiNotesAdapter {
    async fn generate_notes(&self, source_text: &str, length: NoteLength) -> PortResult<String> {
        let bounded = truncate_chars(source_text, self.max_source_chars);
        let user_input = format!(
            "{}\n\nMaterial:\n\n{}",
            length_instruction(length),
            bounded
        );

        let text = with_retry(&self.retry, "generate_notes", || {
            super::chat_complete(&self.client, &self.model, NOTES_SYSTEM, &user_input)
        })
        .await?;

        Ok(text.trim().to_string())
    }

    async fn generate_summary(&self, source_text: &str) -> PortResult<String> {
        let bounded = truncate_chars(source_text, self.max_source_chars);
        let user_input = format!("Summarize this material:\n\n{}", bounded);

        let text = with_retry(&self.retry, "generate_summary", || {
            super::chat_complete(&self.client, &self.model, SUMMARY_SYSTEM, &user_input)
        })
        .await?;

        Ok(text.trim().to_string())
    }
}
