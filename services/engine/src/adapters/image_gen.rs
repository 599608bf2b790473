//! services/engine/src/adapters/image_gen.rs
//!
//! This module contains the adapter for slide and scene illustration.
//! It implements the `ImageService` port from the `core` crate: the primary
//! endpoint is the OpenAI images API; when it fails, the same prompt is keyed
//! into a public URL-based image service. Both failing yields `Ok(None)` —
//! a missing illustration is degradation, not an error.

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::images::{CreateImageRequestArgs, Image, ImageModel, ImageResponseFormat},
    Client,
};
use async_trait::async_trait;
use studyforge_core::ports::{ImageService, PortError, PortResult};
use tracing::warn;

use crate::retry::{with_retry, RetryConfig};

const FALLBACK_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ImageService` using the OpenAI images API with
/// a prompt-keyed public fallback endpoint.
#[derive(Clone)]
pub struct OpenAiImageAdapter {
    client: Client<OpenAIConfig>,
    model: ImageModel,
    fallback_base_url: String,
    http: reqwest::Client,
    retry: RetryConfig,
}

impl OpenAiImageAdapter {
    /// Creates a new `OpenAiImageAdapter`. `fallback_base_url` is the base of
    /// the public image service; the url-encoded prompt is appended to it.
    pub fn new(client: Client<OpenAIConfig>, model: &str, fallback_base_url: String) -> Self {
        let model = match model {
            "dall-e-2" => ImageModel::DallE2,
            "dall-e-3" => ImageModel::DallE3,
            other => ImageModel::Other(other.to_string()),
        };
        Self {
            client,
            model,
            fallback_base_url,
            http: reqwest::Client::new(),
            retry: RetryConfig::default(),
        }
    }

    /// One attempt against the primary endpoint.
    async fn generate_primary(&self, prompt: &str) -> PortResult<Option<String>> {
        let request = CreateImageRequestArgs::default()
            .prompt(prompt)
            .model(self.model.clone())
            .n(1)
            .response_format(ImageResponseFormat::Url)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .images()
            .generate(request)
            .await
            .map_err(super::map_openai_err)?;

        Ok(response.data.into_iter().next().and_then(|image| {
            match image.as_ref() {
                Image::Url { url, .. } => Some(url.clone()),
                _ => None,
            }
        }))
    }

    /// Keys the prompt into the public fallback service and probes that the
    /// resulting URL actually serves an image.
    async fn generate_fallback(&self, prompt: &str) -> Option<String> {
        let url = format!(
            "{}/{}",
            self.fallback_base_url.trim_end_matches('/'),
            urlencoding::encode(prompt)
        );
        let probe = self
            .http
            .get(&url)
            .timeout(FALLBACK_PROBE_TIMEOUT)
            .send()
            .await;
        match probe {
            Ok(response) if response.status().is_success() => Some(url),
            Ok(response) => {
                warn!(status = %response.status(), "fallback image endpoint refused prompt");
                None
            }
            Err(e) => {
                warn!(error = %e, "fallback image endpoint unreachable");
                None
            }
        }
    }
}

//=========================================================================================
// `ImageService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ImageService for OpenAiImageAdapter {
    async fn generate_image(&self, prompt: &str) -> PortResult<Option<String>> {
        let primary = with_retry(&self.retry, "generate_image", || {
            self.generate_primary(prompt)
        })
        .await;

        match primary {
            Ok(Some(url)) => Ok(Some(url)),
            Ok(None) => {
                warn!("primary image endpoint returned no URL, trying fallback");
                Ok(self.generate_fallback(prompt).await)
            }
            Err(e) => {
                warn!(error = %e, "primary image endpoint failed, trying fallback");
                Ok(self.generate_fallback(prompt).await)
            }
        }
    }
}
