//! services/engine/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the per-material tutoring chat.
//! It implements the `ChatService` port from the `core` crate and owns the
//! session handles: on the first message for a material it seeds a session
//! from the system instruction plus a replay of the stored history, then the
//! session carries its own transcript. Grounded turns go through the
//! Responses API with the web-search tool and have their markdown citations
//! lifted into `GroundingSource`s.

use std::collections::HashMap;

use async_openai::{
    config::OpenAIConfig,
    types::{
        chat::{
            ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
            ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
            CreateChatCompletionRequestArgs,
        },
        responses::{CreateResponseArgs, Tool, WebSearchTool},
    },
    Client,
};
use async_trait::async_trait;
use regex::Regex;
use studyforge_core::{
    domain::{ChatMessage, ChatReply, GroundingSource, Sender},
    ports::{ChatContext, ChatService, PortError, PortResult},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::retry::{with_retry, RetryConfig};

const SYSTEM_TEMPLATE: &str = r#"You are a friendly study tutor helping a student with one piece of material.

Material: "{title}" — subject: {subject}, topic: {topic}.

Excerpt of the material:
---
{excerpt}
---

Ground your answers in the material where possible, keep a conversational tone, and keep answers
reasonably concise. When the student asks about current events or statistics the material cannot
answer, say so plainly unless web results are provided."#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatService` using an OpenAI-compatible LLM.
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    /// One live transcript per material, seeded lazily from stored history.
    sessions: Mutex<HashMap<Uuid, Vec<ChatCompletionRequestMessage>>>,
    retry: RetryConfig,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self {
            client,
            model,
            sessions: Mutex::new(HashMap::new()),
            retry: RetryConfig::default(),
        }
    }

    fn system_instruction(ctx: &ChatContext) -> String {
        SYSTEM_TEMPLATE
            .replace("{title}", &ctx.title)
            .replace("{subject}", &ctx.subject)
            .replace("{topic}", &ctx.topic)
            .replace("{excerpt}", &ctx.excerpt)
    }

    /// Builds the seed transcript: system instruction plus replayed turns
    /// mapped from the domain sender vocabulary into API roles.
    fn seed_session(
        ctx: &ChatContext,
        history: &[ChatMessage],
    ) -> PortResult<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 1);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(Self::system_instruction(ctx))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        for turn in history {
            messages.push(match turn.sender {
                Sender::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.text.as_str())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
                Sender::Ai => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.text.as_str())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
            });
        }
        Ok(messages)
    }

    /// A plain chat completion over the session transcript.
    async fn send_plain(&self, messages: Vec<ChatCompletionRequestMessage>) -> PortResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(super::map_openai_err)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::InvalidResponse("chat reply contained no text content.".to_string())
            })
    }

    /// A web-grounded turn through the Responses API. The session transcript
    /// is flattened into the input because that API takes a single string.
    async fn send_grounded(&self, ctx: &ChatContext, transcript: String) -> PortResult<String> {
        let request = CreateResponseArgs::default()
            .model(&self.model)
            .instructions(Self::system_instruction(ctx))
            .input(transcript)
            .tools(vec![Tool::WebSearch(WebSearchTool::default())])
            .max_output_tokens(1000u32)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .responses()
            .create(request)
            .await
            .map_err(super::map_openai_err)?;

        response.output_text().ok_or_else(|| {
            PortError::InvalidResponse("grounded chat reply contained no text.".to_string())
        })
    }
}

/// Flattens a role-tagged transcript into speaker-labelled lines for the
/// Responses API.
fn flatten_transcript(messages: &[ChatCompletionRequestMessage]) -> String {
    use async_openai::types::chat::{
        ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestUserMessageContent,
    };

    let mut lines = Vec::new();
    for message in messages {
        match message {
            ChatCompletionRequestMessage::User(user) => {
                if let ChatCompletionRequestUserMessageContent::Text(text) = &user.content {
                    lines.push(format!("Student: {}", text));
                }
            }
            ChatCompletionRequestMessage::Assistant(assistant) => {
                if let Some(ChatCompletionRequestAssistantMessageContent::Text(text)) =
                    &assistant.content
                {
                    lines.push(format!("Tutor: {}", text));
                }
            }
            _ => {} // the system turn travels in `instructions`
        }
    }
    lines.push("Tutor:".to_string());
    lines.join("\n")
}

/// Removes the optimistic user turn pushed at `index`, but only if that slot
/// still holds it. A concurrent send for the same material may have reshaped
/// the transcript between the push and a failed reply; a turn this call did
/// not push must never be removed.
fn roll_back_user_turn(
    messages: &mut Vec<ChatCompletionRequestMessage>,
    index: usize,
    text: &str,
) {
    use async_openai::types::chat::ChatCompletionRequestUserMessageContent;

    let ours = matches!(
        messages.get(index),
        Some(ChatCompletionRequestMessage::User(user))
            if matches!(&user.content,
                ChatCompletionRequestUserMessageContent::Text(t) if t == text)
    );
    if ours {
        messages.remove(index);
    }
}

/// Lifts markdown citations out of a grounded reply: every `[title](url)`
/// becomes a `GroundingSource`, and parenthesized citation groups are
/// stripped from the visible text.
fn extract_sources(text: &str) -> (String, Vec<GroundingSource>) {
    let link_re = Regex::new(r"\[([^\]]*)\]\((https?://[^)\s]+)\)").unwrap();
    let mut sources: Vec<GroundingSource> = Vec::new();
    for capture in link_re.captures_iter(text) {
        let uri = capture[2].to_string();
        if sources.iter().any(|s| s.uri == uri) {
            continue;
        }
        let title = capture[1].trim();
        sources.push(GroundingSource {
            uri,
            title: (!title.is_empty()).then(|| title.to_string()),
        });
    }

    let citation_re = Regex::new(r"\s*\(\[[^\]]*\]\([^)]*\)\)").unwrap();
    let cleaned = citation_re.replace_all(text, "");
    let cleaned = link_re.replace_all(&cleaned, "$1");
    (cleaned.trim().to_string(), sources)
}

//=========================================================================================
// `ChatService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatService for OpenAiChatAdapter {
    async fn send_message(
        &self,
        ctx: &ChatContext,
        history: &[ChatMessage],
        text: &str,
        grounded: bool,
    ) -> PortResult<ChatReply> {
        // Get or seed the session, then append the new user turn, noting its
        // position for a rollback on failure.
        let (transcript, user_index) = {
            let mut sessions = self.sessions.lock().await;
            let messages = match sessions.entry(ctx.material_id) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(Self::seed_session(ctx, history)?)
                }
            };
            messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(text)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
            );
            (messages.clone(), messages.len() - 1)
        };

        let result = if grounded {
            let input = flatten_transcript(&transcript);
            with_retry(&self.retry, "send_chat_grounded", || {
                self.send_grounded(ctx, input.clone())
            })
            .await
        } else {
            with_retry(&self.retry, "send_chat", || {
                self.send_plain(transcript.clone())
            })
            .await
        };

        let mut sessions = self.sessions.lock().await;
        let messages = sessions.entry(ctx.material_id).or_default();
        match result {
            Ok(raw) => {
                let (cleaned, sources) = if grounded {
                    extract_sources(&raw)
                } else {
                    (raw.trim().to_string(), Vec::new())
                };
                messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(cleaned.as_str())
                        .build()
                        .map_err(|e| PortError::Unexpected(e.to_string()))?
                        .into(),
                );
                Ok(ChatReply {
                    text: cleaned,
                    sources,
                })
            }
            Err(e) => {
                // Roll the optimistic user turn back out of the session so a
                // later retry does not replay it twice.
                roll_back_user_turn(messages, user_index, text);
                Err(e)
            }
        }
    }
}
