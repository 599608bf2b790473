//! services/engine/src/adapters/mod.rs
//!
//! Adapters implementing the core service ports against the OpenAI API and
//! the in-memory content store, plus the small helpers they share.

pub mod chat_llm;
pub mod diagram_llm;
pub mod explain_llm;
pub mod image_gen;
pub mod notes_llm;
pub mod quiz_llm;
pub mod slides_llm;
pub mod store;
pub mod video_llm;

pub use chat_llm::OpenAiChatAdapter;
pub use diagram_llm::OpenAiDiagramAdapter;
pub use explain_llm::OpenAiExplainAdapter;
pub use image_gen::OpenAiImageAdapter;
pub use notes_llm::OpenAiNotesAdapter;
pub use quiz_llm::OpenAiQuizAdapter;
pub use slides_llm::OpenAiSlidesAdapter;
pub use store::InMemoryStore;
pub use video_llm::OpenAiVideoAdapter;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use studyforge_core::ports::{PortError, PortResult};

/// Maps an `async-openai` error into the port taxonomy so the retry layer
/// can tell transient failures from terminal ones.
pub(crate) fn map_openai_err(e: OpenAIError) -> PortError {
    let msg = e.to_string();
    let lowered = msg.to_lowercase();
    if lowered.contains("rate limit") || lowered.contains("429") {
        PortError::RateLimited(msg)
    } else if matches!(e, OpenAIError::Reqwest(_)) {
        PortError::Transport(msg)
    } else {
        PortError::Unexpected(msg)
    }
}

/// Runs one system+user chat completion and extracts the reply text.
/// Shared by every text-generation adapter.
pub(crate) async fn chat_complete(
    client: &Client<OpenAIConfig>,
    model: &str,
    system: &str,
    user: &str,
) -> PortResult<String> {
    let messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(user)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    ];

    let request = CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(messages)
        .n(1)
        .build()
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

    let response = client
        .chat()
        .create(request)
        .await
        .map_err(map_openai_err)?;

    // Extract the text content from the first choice in the response.
    if let Some(choice) = response.choices.into_iter().next() {
        if let Some(content) = choice.message.content {
            Ok(content)
        } else {
            Err(PortError::InvalidResponse(
                "LLM response contained no text content.".to_string(),
            ))
        }
    } else {
        Err(PortError::InvalidResponse(
            "LLM returned no choices in its response.".to_string(),
        ))
    }
}

/// Strips a surrounding markdown code fence from a model reply, if present.
/// Models frequently wrap requested JSON in ```json fences.
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"));
    match without_open {
        Some(rest) => rest.strip_suffix("```").unwrap_or(rest).trim(),
        None => trimmed,
    }
}
