//! services/engine/src/workflow/state.rs
//!
//! Defines the engine's shared state and the ephemeral per-feature
//! generation tracker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_openai::{config::OpenAIConfig, Client};
use futures::StreamExt;
use studyforge_core::ports::{
    ChatService, ContentStore, DiagramService, ExplanationService, ImageService, NotesService,
    ProgressSink, QuizService, SlideService, VideoService,
};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::debug;
use uuid::Uuid;

use crate::adapters::{
    InMemoryStore, OpenAiChatAdapter, OpenAiDiagramAdapter, OpenAiExplainAdapter,
    OpenAiImageAdapter, OpenAiNotesAdapter, OpenAiQuizAdapter, OpenAiSlidesAdapter,
    OpenAiVideoAdapter,
};
use crate::config::Config;

//=========================================================================================
// Features and Their Ephemeral State
//=========================================================================================

/// The per-material generation features the tracker keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Summary,
    Explanation,
    Notes,
    Quiz,
    Video,
    Presentation,
    Diagram,
    Chat,
}

/// Ephemeral, never persisted. `warning` carries a non-fatal degradation
/// message (e.g. some slide images missing) while the content itself stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureState {
    pub in_progress: bool,
    pub error: Option<String>,
    pub warning: Option<String>,
}

struct Slot {
    /// The fencing token of the most recently issued invocation.
    latest: u64,
    state: FeatureState,
}

//=========================================================================================
// GenerationTracker
//=========================================================================================

/// Tracks in-flight/error/warning state per `(material, feature)` and issues
/// fencing tokens so a stale completion can never overwrite a newer
/// invocation's result.
pub struct GenerationTracker {
    slots: Mutex<HashMap<(Uuid, Feature), Slot>>,
    /// Serializes check-then-write commit sequences; see `lock_commits`.
    commits: AsyncMutex<()>,
    progress: Arc<watch::Sender<String>>,
}

impl Default for GenerationTracker {
    fn default() -> Self {
        let (progress, _) = watch::channel(String::new());
        Self {
            slots: Mutex::new(HashMap::new()),
            commits: AsyncMutex::new(()),
            progress: Arc::new(progress),
        }
    }
}

impl GenerationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an invocation: resets the feature to in-progress with no error
    /// or warning, and returns a fresh fencing token for it.
    pub fn begin(&self, id: Uuid, feature: Feature) -> u64 {
        let mut slots = self.slots.lock().expect("tracker lock poisoned");
        let slot = slots.entry((id, feature)).or_insert(Slot {
            latest: 0,
            state: FeatureState::default(),
        });
        slot.latest += 1;
        slot.state = FeatureState {
            in_progress: true,
            error: None,
            warning: None,
        };
        slot.latest
    }

    /// Takes the commit lock. A completion holds it across its `is_latest`
    /// check and the store write that follows, so a newer completion cannot
    /// slip its write between a stale invocation's check and apply.
    pub async fn lock_commits(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.commits.lock().await
    }

    /// True while `token` identifies the most recently issued invocation for
    /// the key. Completions check this before every store write.
    pub fn is_latest(&self, id: Uuid, feature: Feature, token: u64) -> bool {
        let slots = self.slots.lock().expect("tracker lock poisoned");
        slots
            .get(&(id, feature))
            .map(|slot| slot.latest == token)
            .unwrap_or(false)
    }

    /// Records a non-fatal warning for the invocation, if it is still the
    /// latest.
    pub fn warn(&self, id: Uuid, feature: Feature, token: u64, message: String) {
        let mut slots = self.slots.lock().expect("tracker lock poisoned");
        if let Some(slot) = slots.get_mut(&(id, feature)) {
            if slot.latest == token {
                slot.state.warning = Some(message);
            }
        }
    }

    /// Completes an invocation: clears in-progress and records the outcome.
    /// A stale token leaves the state alone — the newer invocation owns it.
    pub fn finish(&self, id: Uuid, feature: Feature, token: u64, outcome: Result<(), String>) {
        let mut slots = self.slots.lock().expect("tracker lock poisoned");
        let Some(slot) = slots.get_mut(&(id, feature)) else {
            return;
        };
        if slot.latest != token {
            debug!(?feature, token, "stale invocation finished after a newer one began");
            return;
        }
        slot.state.in_progress = false;
        slot.state.error = outcome.err();
    }

    /// A snapshot of the feature's state for UI consumption.
    pub fn state(&self, id: Uuid, feature: Feature) -> FeatureState {
        let slots = self.slots.lock().expect("tracker lock poisoned");
        slots
            .get(&(id, feature))
            .map(|slot| slot.state.clone())
            .unwrap_or_default()
    }

    /// Subscribes to the human-readable progress line.
    pub fn progress(&self) -> watch::Receiver<String> {
        self.progress.subscribe()
    }

    fn progress_sender(&self) -> Arc<watch::Sender<String>> {
        Arc::clone(&self.progress)
    }
}

//=========================================================================================
// EngineState (Shared Across All Callers)
//=========================================================================================

/// The shared engine state, created once at startup and cloned into every
/// caller. All service handles are port trait objects so tests can swap in
/// mocks.
#[derive(Clone)]
pub struct EngineState {
    pub store: Arc<dyn ContentStore>,
    pub explain: Arc<dyn ExplanationService>,
    pub notes: Arc<dyn NotesService>,
    pub quiz: Arc<dyn QuizService>,
    pub slides: Arc<dyn SlideService>,
    pub images: Arc<dyn ImageService>,
    pub diagram: Arc<dyn DiagramService>,
    pub video: Arc<dyn VideoService>,
    pub chat: Arc<dyn ChatService>,
    pub tracker: Arc<GenerationTracker>,
}

impl EngineState {
    /// Wires the production adapters from configuration.
    pub fn from_config(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new().with_api_key(&config.openai_api_key);
        let client = Client::with_config(openai_config);
        let max = config.max_source_chars;

        Self {
            store: Arc::new(InMemoryStore::new()),
            explain: Arc::new(OpenAiExplainAdapter::new(
                client.clone(),
                config.explain_model.clone(),
                max,
            )),
            notes: Arc::new(OpenAiNotesAdapter::new(
                client.clone(),
                config.notes_model.clone(),
                max,
            )),
            quiz: Arc::new(OpenAiQuizAdapter::new(
                client.clone(),
                config.quiz_model.clone(),
                max,
            )),
            slides: Arc::new(OpenAiSlidesAdapter::new(
                client.clone(),
                config.slides_model.clone(),
            )),
            images: Arc::new(OpenAiImageAdapter::new(
                client.clone(),
                &config.image_model,
                config.image_fallback_url.clone(),
            )),
            diagram: Arc::new(OpenAiDiagramAdapter::new(
                client.clone(),
                config.diagram_model.clone(),
            )),
            video: Arc::new(OpenAiVideoAdapter::new(
                client.clone(),
                config.video_model.clone(),
            )),
            chat: Arc::new(OpenAiChatAdapter::new(client, config.chat_model.clone())),
            tracker: Arc::new(GenerationTracker::new()),
        }
    }

    /// A progress sink whose stage strings feed the tracker's observable
    /// progress line.
    pub(crate) fn progress_sink(&self) -> ProgressSink {
        let (sink, mut rx) = ProgressSink::channel();
        let tx = self.tracker.progress_sender();
        tokio::spawn(async move {
            while let Some(stage) = rx.next().await {
                let _ = tx.send(stage);
            }
        });
        sink
    }
}
