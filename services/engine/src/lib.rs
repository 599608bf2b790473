//! services/engine/src/lib.rs
//!
//! The StudyForge generation engine: adapters over an OpenAI-compatible API,
//! an in-memory content store, and the per-feature orchestration workflows
//! that tie them together. An embedding front end drives it through
//! `EngineState` — there is no HTTP or CLI surface here.

pub mod adapters;
pub mod config;
pub mod error;
pub mod retry;
pub mod workflow;

pub use config::Config;
pub use error::EngineError;
pub use workflow::{EngineState, Feature, FeatureState, GenerationTracker};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes structured logging for an embedding application. Call once
/// at startup; the filter defaults to the configured level.
pub fn init_tracing(config: &Config) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            config.log_level.to_string(),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
