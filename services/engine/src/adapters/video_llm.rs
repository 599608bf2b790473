//! services/engine/src/adapters/video_llm.rs
//!
//! This module contains the adapter for the narrated-video script LLM.
//! It implements the `VideoService` port from the `core` crate. Only the
//! scripting phase lives here; scene images are filled in separately by the
//! `ImageService`.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use studyforge_core::{
    domain::VideoScene,
    ports::{PortError, PortResult, VideoService},
};

use crate::retry::{with_retry, RetryConfig};

const SCENE_COUNT: usize = 5;

const SYSTEM_INSTRUCTIONS: &str = r#"You are a video scriptwriter. Turn the provided explanation into a short narrated video of exactly 5 scenes.

Respond with ONLY a JSON array of exactly 5 elements, no prose and no code fences:
  [{"script": "...", "image_prompt": "..."}]

Rules:
- "script" is two or three spoken sentences of narration.
- "image_prompt" describes one cinematic, visually rich still for the scene.
- The five scenes together must tell the explanation's story in order."#;

/// Parses and validates the model's reply into exactly five scripted scenes.
fn parse_scenes(raw: &str) -> PortResult<Vec<VideoScene>> {
    let body = super::strip_code_fences(raw);
    let scenes: Vec<VideoScene> = serde_json::from_str(body)
        .map_err(|e| PortError::InvalidResponse(format!("scene JSON did not parse: {e}")))?;

    if scenes.len() != SCENE_COUNT {
        return Err(PortError::InvalidResponse(format!(
            "expected exactly {SCENE_COUNT} scenes, got {}",
            scenes.len()
        )));
    }
    for scene in &scenes {
        if scene.script.trim().is_empty() || scene.image_prompt.trim().is_empty() {
            return Err(PortError::InvalidResponse(
                "scene missing script or image prompt".to_string(),
            ));
        }
    }
    Ok(scenes)
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `VideoService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiVideoAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    retry: RetryConfig,
}

impl OpenAiVideoAdapter {
    /// Creates a new `OpenAiVideoAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self {
            client,
            model,
            retry: RetryConfig::default(),
        }
    }
}

//=========================================================================================
// `VideoService` Trait Implementation
//=========================================================================================

#[async_trait]
impl VideoService for OpenAiVideoAdapter {
    async fn generate_scenes(&self, explanation: &str) -> PortResult<Vec<VideoScene>> {
        let user_input = format!("Script the video for this explanation:\n\n{}", explanation);

        let raw = with_retry(&self.retry, "generate_scenes", || {
            super::chat_complete(&self.client, &self.model, SYSTEM_INSTRUCTIONS, &user_input)
        })
        .await?;

        parse_scenes(&raw)
    }
}
