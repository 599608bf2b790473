//! services/engine/src/workflow/mod.rs
//!
//! The generation orchestrator: per-feature workflows over the gateway
//! ports, the ephemeral generation tracker, and the chat session workflow.

pub mod chat;
pub mod generation;
pub mod state;

pub use chat::CHAT_APOLOGY;
pub use generation::EXPLANATION_REQUIRED;
pub use state::{EngineState, Feature, FeatureState, GenerationTracker};
