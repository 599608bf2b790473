//! services/engine/src/adapters/slides_llm.rs
//!
//! This module contains the adapter for the presentation-outline LLM.
//! It implements the `SlideService` port from the `core` crate. Only the
//! text phase lives here; slide images are filled in separately by the
//! `ImageService`.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use studyforge_core::{
    domain::Presentation,
    ports::{PortError, PortResult, SlideService},
};

use crate::retry::{with_retry, RetryConfig};

const SYSTEM_INSTRUCTIONS: &str = r#"You are a presentation designer. Turn the provided explanation into a slide deck.

Respond with ONLY a JSON object, no prose and no code fences:
  {"title": "...", "slides": [{"title": "...", "bullets": ["...", "..."], "image_prompt": "..."}]}

Rules:
- Between 5 and 7 slides.
- 2 to 4 concise bullets per slide.
- "image_prompt" describes a single clean illustration for the slide, suitable for an image model."#;

const MIN_SLIDES: usize = 5;
const MAX_SLIDES: usize = 7;

/// Parses and validates the model's reply into a typed outline.
fn parse_outline(raw: &str) -> PortResult<Presentation> {
    let body = super::strip_code_fences(raw);
    let outline: Presentation = serde_json::from_str(body)
        .map_err(|e| PortError::InvalidResponse(format!("outline JSON did not parse: {e}")))?;

    if outline.slides.len() < MIN_SLIDES || outline.slides.len() > MAX_SLIDES {
        return Err(PortError::InvalidResponse(format!(
            "expected {MIN_SLIDES}-{MAX_SLIDES} slides, got {}",
            outline.slides.len()
        )));
    }
    for slide in &outline.slides {
        if slide.bullets.is_empty() || slide.image_prompt.trim().is_empty() {
            return Err(PortError::InvalidResponse(
                "slide missing bullets or image prompt".to_string(),
            ));
        }
    }
    Ok(outline)
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `SlideService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiSlidesAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    retry: RetryConfig,
}

impl OpenAiSlidesAdapter {
    /// Creates a new `OpenAiSlidesAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self {
            client,
            model,
            retry: RetryConfig::default(),
        }
    }
}

//=========================================================================================
// `SlideService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SlideService for OpenAiSlidesAdapter {
    async fn generate_outline(&self, explanation: &str) -> PortResult<Presentation> {
        let user_input = format!("Design the deck for this explanation:\n\n{}", explanation);

        let raw = with_retry(&self.retry, "generate_outline", || {
            super::chat_complete(&self.client, &self.model, SYSTEM_INSTRUCTIONS, &user_input)
        })
        .await?;

        parse_outline(&raw)
    }
}
