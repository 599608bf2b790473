//! crates/studyforge_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like the
//! generative AI API or the content store.

use async_trait::async_trait;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::domain::{
    ChatMessage, ChatReply, Diagram, NoteLength, Presentation, QuizQuestion, StudyMaterial,
    VideoScene, truncate_chars,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error taxonomy shared by all port operations.
///
/// `Transport` and `RateLimited` are transient and may be retried by the
/// gateway; the remaining variants are terminal and propagate immediately.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Precondition not met: {0}")]
    Precondition(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Response failed validation: {0}")]
    InvalidResponse(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// True for failures that tend to resolve on their own and are worth
    /// retrying with backoff. Schema and precondition failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RateLimited(_))
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Progress Reporting
//=========================================================================================

/// A one-way channel for human-readable stage strings emitted by long-running
/// gateway operations ("Illustrating slide 3 of 6..."). Decouples progress
/// reporting from the success/failure result path: a sink can be dropped or
/// disabled without affecting the operation's outcome.
#[derive(Clone)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<String>>,
}

impl ProgressSink {
    /// Creates a connected sink/receiver pair.
    pub fn channel() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that silently discards every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Reports one stage string. Send failures (receiver gone) are ignored;
    /// progress is advisory, never load-bearing.
    pub fn report(&self, stage: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.unbounded_send(stage.into());
        }
    }
}

//=========================================================================================
// Content Store Port
//=========================================================================================

/// An addressed, field-scoped update to one generated field of a material.
/// Each variant names exactly one field; applying a variant never touches any
/// other field, which bounds the blast radius of a lost race to that field.
#[derive(Debug, Clone)]
pub enum FieldUpdate {
    Summary(String),
    Explanation(String),
    Note(NoteLength, String),
    /// `None` clears the field back to absent.
    Presentation(Option<Presentation>),
    Diagram(Diagram),
    VideoScenes(Vec<VideoScene>),
    /// Appended under the store's own lock, so the latest stored history is
    /// always the base and concurrent appends are never clobbered.
    AppendChat(Vec<ChatMessage>),
}

/// The keyed collection of study materials. The store exclusively owns the
/// records; every read goes through `get` and every write through `apply` —
/// there is no full-record replace.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn create(&self, material: StudyMaterial) -> PortResult<()>;

    async fn get(&self, id: Uuid) -> PortResult<StudyMaterial>;

    async fn apply(&self, id: Uuid, update: FieldUpdate) -> PortResult<()>;

    async fn list(&self) -> PortResult<Vec<StudyMaterial>>;
}

//=========================================================================================
// AI Gateway Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ExplanationService: Send + Sync {
    /// Generates a thorough explanation of the source text.
    async fn generate_explanation(&self, source_text: &str) -> PortResult<String>;
}

#[async_trait]
pub trait NotesService: Send + Sync {
    /// Generates study notes at the requested length.
    async fn generate_notes(&self, source_text: &str, length: NoteLength) -> PortResult<String>;

    /// Generates a short abstract of the source text.
    async fn generate_summary(&self, source_text: &str) -> PortResult<String>;
}

#[async_trait]
pub trait QuizService: Send + Sync {
    /// Generates a quiz; the response is schema-validated before being
    /// returned, so callers never see malformed questions.
    async fn generate_quiz(&self, source_text: &str) -> PortResult<Vec<QuizQuestion>>;
}

#[async_trait]
pub trait SlideService: Send + Sync {
    /// Generates a presentation outline (title, 5-7 slides with bullets and
    /// image prompts, no images yet) from an explanation.
    async fn generate_outline(&self, explanation: &str) -> PortResult<Presentation>;
}

#[async_trait]
pub trait ImageService: Send + Sync {
    /// Generates one image for the prompt and returns its URL. A primary
    /// failure falls back to a secondary endpoint keyed by the same prompt;
    /// both failing yields `Ok(None)` — a missing image is never fatal.
    async fn generate_image(&self, prompt: &str) -> PortResult<Option<String>>;
}

#[async_trait]
pub trait DiagramService: Send + Sync {
    /// Generates flowchart source for the explanation. Output that cannot be
    /// coaxed into valid flowchart syntax comes back as `Diagram::Failed`
    /// rather than an error.
    async fn generate_diagram(&self, explanation: &str) -> PortResult<Diagram>;
}

#[async_trait]
pub trait VideoService: Send + Sync {
    /// Generates exactly five narrated scenes (script plus cinematic image
    /// prompt, no images yet) from an explanation.
    async fn generate_scenes(&self, explanation: &str) -> PortResult<Vec<VideoScene>>;
}

/// The per-material context a chat session is seeded with.
#[derive(Debug, Clone)]
pub struct ChatContext {
    pub material_id: Uuid,
    pub title: String,
    pub subject: String,
    pub topic: String,
    pub excerpt: String,
}

impl ChatContext {
    /// Builds the session context from a material, bounding the source
    /// excerpt to `max_excerpt_chars`.
    pub fn for_material(material: &StudyMaterial, max_excerpt_chars: usize) -> Self {
        Self {
            material_id: material.id,
            title: material.title.clone(),
            subject: material.subject.clone(),
            topic: material.topic.clone(),
            excerpt: truncate_chars(&material.extracted_text, max_excerpt_chars).to_string(),
        }
    }
}

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Sends one user turn to the material's conversation and returns the
    /// reply. The adapter owns the session handle: on first use it seeds a
    /// session from the context's system instruction plus a replay of
    /// `history`; afterwards the session carries its own transcript. When
    /// `grounded` is set the reply is web-grounded and carries citations.
    async fn send_message(
        &self,
        ctx: &ChatContext,
        history: &[ChatMessage],
        text: &str,
        grounded: bool,
    ) -> PortResult<ChatReply>;
}
