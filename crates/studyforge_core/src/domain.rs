//! crates/studyforge_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any store or transport format; serde
//! derives exist so the gateway adapters can parse model output directly
//! into them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// How advanced the study material is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

/// What kind of source the user uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Document,
    Notes,
    Textbook,
    Article,
}

/// Requested length for generated study notes. Keys of `StudyMaterial::notes`
/// are populated lazily, one per length, and never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteLength {
    Short,
    Medium,
    Detailed,
}

/// One slide of a generated presentation. `image_url` stays `None` until the
/// image phase fills it in; a slide whose image could not be generated keeps
/// `None` permanently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub title: String,
    pub bullets: Vec<String>,
    pub image_prompt: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A generated presentation: a deck title plus an ordered slide sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    pub title: String,
    pub slides: Vec<Slide>,
}

/// Generated flowchart source, or the explicit sentinel for a generation that
/// could not produce valid flowchart syntax. Never an ambiguous empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagram {
    Source(String),
    Failed,
}

/// One scene of a narrated video: a narration script, the prompt used to
/// illustrate it, and the illustration once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoScene {
    pub script: String,
    pub image_prompt: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

/// A citation attached to a web-grounded chat reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: Option<String>,
}

/// A single chat transcript entry. Append-only once added to a material's
/// history; never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sources: Vec<GroundingSource>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: Sender::User,
            text: text.into(),
            timestamp: Utc::now(),
            sources: Vec::new(),
        }
    }

    pub fn ai(text: impl Into<String>, sources: Vec<GroundingSource>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: Sender::Ai,
            text: text.into(),
            timestamp: Utc::now(),
            sources,
        }
    }
}

/// The reply produced by the chat gateway for one user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// A generated quiz question. The tag discriminates the two shapes the model
/// may produce; anything else fails schema validation at the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuizQuestion {
    MultipleChoice {
        prompt: String,
        options: Vec<String>,
        answer_index: usize,
    },
    ShortAnswer {
        prompt: String,
        reference_answer: String,
    },
}

/// The immutable inputs for creating a new study material.
#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub title: String,
    pub subject: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub kind: MaterialKind,
    pub extracted_text: String,
}

/// One user-uploaded unit of content plus every AI-generated artifact derived
/// from it. Source fields are immutable after creation; each generated field
/// is independently absent until its workflow fills it in, and regeneration
/// replaces only that field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyMaterial {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub subject: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub kind: MaterialKind,
    pub extracted_text: String,
    pub summary: Option<String>,
    pub ai_explanation: Option<String>,
    pub notes: BTreeMap<NoteLength, String>,
    pub presentation: Option<Presentation>,
    pub diagram: Option<Diagram>,
    pub video_scenes: Option<Vec<VideoScene>>,
    pub chat_history: Vec<ChatMessage>,
}

impl StudyMaterial {
    /// Creates a fresh material with a new id and no generated artifacts.
    pub fn new(input: NewMaterial) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            title: input.title,
            subject: input.subject,
            topic: input.topic,
            difficulty: input.difficulty,
            kind: input.kind,
            extracted_text: input.extracted_text,
            summary: None,
            ai_explanation: None,
            notes: BTreeMap::new(),
            presentation: None,
            diagram: None,
            video_scenes: None,
            chat_history: Vec::new(),
        }
    }

    /// The explanation text, if one has been generated and is non-empty.
    pub fn explanation(&self) -> Option<&str> {
        self.ai_explanation
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Returns a prefix of `text` at most `max_chars` characters long, cut on a
/// character boundary. Used to bound prompt sizes before submission.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
