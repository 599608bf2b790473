//! services/engine/tests/workflow.rs
//!
//! Integration tests for the generation workflows, run against mock port
//! implementations so every gateway outcome can be scripted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use engine_lib::adapters::InMemoryStore;
use engine_lib::workflow::{
    EngineState, Feature, GenerationTracker, CHAT_APOLOGY, EXPLANATION_REQUIRED,
};
use studyforge_core::domain::{
    ChatMessage, ChatReply, Diagram, Difficulty, GroundingSource, MaterialKind, NewMaterial,
    NoteLength, Presentation, QuizQuestion, Slide, StudyMaterial, VideoScene,
};
use studyforge_core::ports::{
    ChatContext, ChatService, ContentStore, DiagramService, ExplanationService, FieldUpdate,
    ImageService, NotesService, PortError, PortResult, QuizService, SlideService, VideoService,
};
use tokio::sync::Semaphore;
use uuid::Uuid;

//=========================================================================================
// Mock Port Implementations
//=========================================================================================

struct StaticExplain {
    reply: String,
    calls: AtomicUsize,
}

impl StaticExplain {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExplanationService for StaticExplain {
    async fn generate_explanation(&self, _source_text: &str) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// First call parks on a gate so a second invocation can overtake it.
struct GatedExplain {
    started: Arc<Semaphore>,
    release: Arc<Semaphore>,
    calls: AtomicUsize,
}

#[async_trait]
impl ExplanationService for GatedExplain {
    async fn generate_explanation(&self, _source_text: &str) -> PortResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            self.started.add_permits(1);
            self.release.acquire().await.unwrap().forget();
            Ok("stale explanation".to_string())
        } else {
            Ok("fresh explanation".to_string())
        }
    }
}

struct StaticNotes;

#[async_trait]
impl NotesService for StaticNotes {
    async fn generate_notes(&self, _source_text: &str, length: NoteLength) -> PortResult<String> {
        Ok(format!("{length:?} notes"))
    }

    async fn generate_summary(&self, _source_text: &str) -> PortResult<String> {
        Ok("a summary".to_string())
    }
}

struct ScriptedQuiz {
    fail: bool,
}

#[async_trait]
impl QuizService for ScriptedQuiz {
    async fn generate_quiz(&self, _source_text: &str) -> PortResult<Vec<QuizQuestion>> {
        if self.fail {
            Err(PortError::InvalidResponse("quiz JSON did not parse".into()))
        } else {
            Ok(vec![QuizQuestion::ShortAnswer {
                prompt: "Why?".into(),
                reference_answer: "Because.".into(),
            }])
        }
    }
}

struct CountingSlides {
    slide_count: usize,
    calls: AtomicUsize,
}

impl CountingSlides {
    fn new(slide_count: usize) -> Self {
        Self {
            slide_count,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SlideService for CountingSlides {
    async fn generate_outline(&self, _explanation: &str) -> PortResult<Presentation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Presentation {
            title: "Deck".into(),
            slides: (0..self.slide_count)
                .map(|i| Slide {
                    title: format!("Slide {i}"),
                    bullets: vec!["point".into()],
                    image_prompt: format!("prompt {i}"),
                    image_url: None,
                })
                .collect(),
        })
    }
}

/// Pops scripted results in order; once the script is exhausted every further
/// prompt yields `Ok(None)`.
struct ScriptedImages {
    script: Mutex<VecDeque<PortResult<Option<String>>>>,
}

impl ScriptedImages {
    fn from_script(script: Vec<PortResult<Option<String>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }

    fn always_ok() -> Self {
        Self::from_script(Vec::new())
    }
}

#[async_trait]
impl ImageService for ScriptedImages {
    async fn generate_image(&self, prompt: &str) -> PortResult<Option<String>> {
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(Some(format!("https://img.test/{}", prompt.len()))),
        }
    }
}

/// Replies with the scripted explanations in order, then a fixed default.
struct SequencedExplain {
    replies: Mutex<VecDeque<&'static str>>,
}

impl SequencedExplain {
    fn new(replies: Vec<&'static str>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl ExplanationService for SequencedExplain {
    async fn generate_explanation(&self, _source_text: &str) -> PortResult<String> {
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or("explanation");
        Ok(reply.to_string())
    }
}

/// Delegates reads to the wrapped store but rejects every write.
struct FailingApplyStore {
    inner: Arc<InMemoryStore>,
}

#[async_trait]
impl ContentStore for FailingApplyStore {
    async fn create(&self, material: StudyMaterial) -> PortResult<()> {
        self.inner.create(material).await
    }

    async fn get(&self, id: Uuid) -> PortResult<StudyMaterial> {
        self.inner.get(id).await
    }

    async fn apply(&self, _id: Uuid, _update: FieldUpdate) -> PortResult<()> {
        Err(PortError::Unexpected("write rejected".into()))
    }

    async fn list(&self) -> PortResult<Vec<StudyMaterial>> {
        self.inner.list().await
    }
}

/// Parks the first explanation write until released so a second invocation's
/// write can race it.
struct GatedApplyStore {
    inner: Arc<InMemoryStore>,
    started: Arc<Semaphore>,
    release: Arc<Semaphore>,
    gated: AtomicUsize,
}

#[async_trait]
impl ContentStore for GatedApplyStore {
    async fn create(&self, material: StudyMaterial) -> PortResult<()> {
        self.inner.create(material).await
    }

    async fn get(&self, id: Uuid) -> PortResult<StudyMaterial> {
        self.inner.get(id).await
    }

    async fn apply(&self, id: Uuid, update: FieldUpdate) -> PortResult<()> {
        if matches!(update, FieldUpdate::Explanation(_))
            && self.gated.fetch_add(1, Ordering::SeqCst) == 0
        {
            self.started.add_permits(1);
            self.release.acquire().await.unwrap().forget();
        }
        self.inner.apply(id, update).await
    }

    async fn list(&self) -> PortResult<Vec<StudyMaterial>> {
        self.inner.list().await
    }
}

/// An image service for which both the primary and the fallback endpoint
/// always come up empty.
struct FailingImages;

#[async_trait]
impl ImageService for FailingImages {
    async fn generate_image(&self, _prompt: &str) -> PortResult<Option<String>> {
        Ok(None)
    }
}

struct StaticDiagram {
    result: Diagram,
}

#[async_trait]
impl DiagramService for StaticDiagram {
    async fn generate_diagram(&self, _explanation: &str) -> PortResult<Diagram> {
        Ok(self.result.clone())
    }
}

struct StaticVideo;

#[async_trait]
impl VideoService for StaticVideo {
    async fn generate_scenes(&self, _explanation: &str) -> PortResult<Vec<VideoScene>> {
        Ok((0..5)
            .map(|i| VideoScene {
                script: format!("Scene {i} narration."),
                image_prompt: format!("scene {i}"),
                image_url: None,
            })
            .collect())
    }
}

enum ChatScript {
    Reply(String, Vec<GroundingSource>),
    Fail,
    /// Appends an unrelated message to the store mid-request, then fails —
    /// exercises the latest-history-as-base guarantee.
    InterleaveThenFail(Arc<InMemoryStore>, Uuid),
}

struct ScriptedChat {
    script: ChatScript,
}

#[async_trait]
impl ChatService for ScriptedChat {
    async fn send_message(
        &self,
        _ctx: &ChatContext,
        _history: &[ChatMessage],
        _text: &str,
        _grounded: bool,
    ) -> PortResult<ChatReply> {
        match &self.script {
            ChatScript::Reply(text, sources) => Ok(ChatReply {
                text: text.clone(),
                sources: sources.clone(),
            }),
            ChatScript::Fail => Err(PortError::Transport("connection reset".into())),
            ChatScript::InterleaveThenFail(store, id) => {
                store
                    .apply(
                        *id,
                        FieldUpdate::AppendChat(vec![ChatMessage::ai(
                            "interleaved note",
                            Vec::new(),
                        )]),
                    )
                    .await
                    .unwrap();
                Err(PortError::Transport("connection reset".into()))
            }
        }
    }
}

//=========================================================================================
// Test Harness
//=========================================================================================

fn material_input() -> NewMaterial {
    NewMaterial {
        title: "Photosynthesis".into(),
        subject: "Biology".into(),
        topic: "Plant metabolism".into(),
        difficulty: Difficulty::Beginner,
        kind: MaterialKind::Document,
        extracted_text: "Plants convert light into chemical energy.".into(),
    }
}

fn engine(store: Arc<InMemoryStore>) -> EngineState {
    EngineState {
        store,
        explain: Arc::new(StaticExplain::new("generated explanation")),
        notes: Arc::new(StaticNotes),
        quiz: Arc::new(ScriptedQuiz { fail: false }),
        slides: Arc::new(CountingSlides::new(6)),
        images: Arc::new(ScriptedImages::always_ok()),
        diagram: Arc::new(StaticDiagram {
            result: Diagram::Source("graph TD\nA --> B".into()),
        }),
        video: Arc::new(StaticVideo),
        chat: Arc::new(ScriptedChat {
            script: ChatScript::Reply("a helpful reply".into(), Vec::new()),
        }),
        tracker: Arc::new(GenerationTracker::new()),
    }
}

async fn seeded_material(state: &EngineState) -> StudyMaterial {
    state.create_material(material_input()).await.unwrap()
}

/// Creates a material and gives it an explanation, the precondition for the
/// downstream features.
async fn explained_material(state: &EngineState) -> StudyMaterial {
    let material = seeded_material(state).await;
    state
        .store
        .apply(
            material.id,
            FieldUpdate::Explanation("an existing explanation".into()),
        )
        .await
        .unwrap();
    state.store.get(material.id).await.unwrap()
}

//=========================================================================================
// Single-Phase Workflows
//=========================================================================================

#[tokio::test]
async fn explanation_lands_in_its_field_and_state_settles() {
    let state = engine(Arc::new(InMemoryStore::new()));
    let id = seeded_material(&state).await.id;

    state.generate_explanation(id).await.unwrap();

    let stored = state.store.get(id).await.unwrap();
    assert_eq!(stored.ai_explanation.as_deref(), Some("generated explanation"));
    let feature = state.tracker.state(id, Feature::Explanation);
    assert!(!feature.in_progress);
    assert_eq!(feature.error, None);
}

#[tokio::test]
async fn notes_generation_touches_only_the_requested_length() {
    let state = engine(Arc::new(InMemoryStore::new()));
    let id = seeded_material(&state).await.id;
    state
        .store
        .apply(id, FieldUpdate::Note(NoteLength::Short, "handwritten short".into()))
        .await
        .unwrap();

    state.generate_notes(id, NoteLength::Detailed).await.unwrap();

    let stored = state.store.get(id).await.unwrap();
    assert_eq!(stored.notes[&NoteLength::Short], "handwritten short");
    assert_eq!(stored.notes[&NoteLength::Detailed], "Detailed notes");
    assert!(!stored.notes.contains_key(&NoteLength::Medium));
}

#[tokio::test]
async fn regenerating_explanation_leaves_every_other_field_alone() {
    let state = engine(Arc::new(InMemoryStore::new()));
    let id = seeded_material(&state).await.id;
    state
        .store
        .apply(id, FieldUpdate::Note(NoteLength::Short, "short".into()))
        .await
        .unwrap();
    state
        .store
        .apply(id, FieldUpdate::AppendChat(vec![ChatMessage::user("hi")]))
        .await
        .unwrap();
    let before = state.store.get(id).await.unwrap();

    state.generate_explanation(id).await.unwrap();

    let after = state.store.get(id).await.unwrap();
    assert_eq!(after.ai_explanation.as_deref(), Some("generated explanation"));
    assert_eq!(after.notes, before.notes);
    assert_eq!(after.chat_history, before.chat_history);
    assert_eq!(after.summary, before.summary);
    assert_eq!(after.presentation, before.presentation);
}

#[tokio::test]
async fn summary_workflow_fills_the_summary_field() {
    let state = engine(Arc::new(InMemoryStore::new()));
    let id = seeded_material(&state).await.id;

    state.generate_summary(id).await.unwrap();

    let stored = state.store.get(id).await.unwrap();
    assert_eq!(stored.summary.as_deref(), Some("a summary"));
}

#[tokio::test]
async fn quiz_success_returns_questions_without_storing_them() {
    let state = engine(Arc::new(InMemoryStore::new()));
    let id = seeded_material(&state).await.id;

    let questions = state.generate_quiz(id).await.unwrap();
    assert_eq!(questions.unwrap().len(), 1);
    assert_eq!(state.tracker.state(id, Feature::Quiz).error, None);
}

#[tokio::test]
async fn quiz_failure_records_a_feature_scoped_error() {
    let mut state = engine(Arc::new(InMemoryStore::new()));
    state.quiz = Arc::new(ScriptedQuiz { fail: true });
    let id = seeded_material(&state).await.id;

    let questions = state.generate_quiz(id).await.unwrap();
    assert!(questions.is_none());
    let feature = state.tracker.state(id, Feature::Quiz);
    assert!(!feature.in_progress);
    assert!(feature.error.unwrap().contains("quiz JSON did not parse"));
}

//=========================================================================================
// Explanation Precondition
//=========================================================================================

#[tokio::test]
async fn presentation_without_explanation_never_reaches_the_gateway() {
    let mut state = engine(Arc::new(InMemoryStore::new()));
    let slides = Arc::new(CountingSlides::new(6));
    state.slides = slides.clone();
    let id = seeded_material(&state).await.id;

    state.generate_presentation(id).await.unwrap();

    assert_eq!(slides.calls.load(Ordering::SeqCst), 0);
    let feature = state.tracker.state(id, Feature::Presentation);
    assert_eq!(feature.error.as_deref(), Some(EXPLANATION_REQUIRED));
    assert!(state.store.get(id).await.unwrap().presentation.is_none());
}

#[tokio::test]
async fn diagram_and_video_share_the_precondition() {
    let state = engine(Arc::new(InMemoryStore::new()));
    let id = seeded_material(&state).await.id;

    state.generate_diagram(id).await.unwrap();
    state.generate_video(id).await.unwrap();

    assert_eq!(
        state.tracker.state(id, Feature::Diagram).error.as_deref(),
        Some(EXPLANATION_REQUIRED)
    );
    assert_eq!(
        state.tracker.state(id, Feature::Video).error.as_deref(),
        Some(EXPLANATION_REQUIRED)
    );
    let stored = state.store.get(id).await.unwrap();
    assert!(stored.diagram.is_none());
    assert!(stored.video_scenes.is_none());
}

//=========================================================================================
// Two-Phase Presentation Policy
//=========================================================================================

#[tokio::test]
async fn presentation_with_all_images_ends_fully_illustrated() {
    let state = engine(Arc::new(InMemoryStore::new()));
    let id = explained_material(&state).await.id;

    state.generate_presentation(id).await.unwrap();

    let stored = state.store.get(id).await.unwrap();
    let deck = stored.presentation.unwrap();
    assert_eq!(deck.slides.len(), 6);
    assert!(deck.slides.iter().all(|s| s.image_url.is_some()));
    let feature = state.tracker.state(id, Feature::Presentation);
    assert_eq!(feature.error, None);
    assert_eq!(feature.warning, None);
}

#[tokio::test]
async fn presentation_is_rolled_back_when_every_image_fails() {
    let mut state = engine(Arc::new(InMemoryStore::new()));
    state.images = Arc::new(FailingImages);
    let id = explained_material(&state).await.id;

    state.generate_presentation(id).await.unwrap();

    // Not content-without-images: the field must end absent.
    assert!(state.store.get(id).await.unwrap().presentation.is_none());
    let feature = state.tracker.state(id, Feature::Presentation);
    assert!(!feature.in_progress);
    assert!(!feature.error.unwrap().is_empty());
}

#[tokio::test]
async fn presentation_survives_a_partial_image_failure_with_a_warning() {
    let mut state = engine(Arc::new(InMemoryStore::new()));
    state.images = Arc::new(ScriptedImages::from_script(vec![
        Ok(Some("https://img.test/0".into())),
        Ok(Some("https://img.test/1".into())),
        Ok(Some("https://img.test/2".into())),
        Ok(None),
        Ok(None),
        Ok(None),
    ]));
    let id = explained_material(&state).await.id;

    state.generate_presentation(id).await.unwrap();

    let deck = state.store.get(id).await.unwrap().presentation.unwrap();
    assert_eq!(
        deck.slides.iter().filter(|s| s.image_url.is_some()).count(),
        3
    );
    let feature = state.tracker.state(id, Feature::Presentation);
    assert_eq!(feature.error, None);
    assert_eq!(
        feature.warning.as_deref(),
        Some("3 of 6 slide images could not be generated.")
    );
}

//=========================================================================================
// Video and Diagram Policies
//=========================================================================================

#[tokio::test]
async fn video_keeps_its_scripts_when_every_image_fails() {
    let mut state = engine(Arc::new(InMemoryStore::new()));
    state.images = Arc::new(FailingImages);
    let id = explained_material(&state).await.id;

    state.generate_video(id).await.unwrap();

    let scenes = state.store.get(id).await.unwrap().video_scenes.unwrap();
    assert_eq!(scenes.len(), 5);
    assert!(scenes.iter().all(|s| s.image_url.is_none()));
    assert!(!scenes[0].script.is_empty());
    let feature = state.tracker.state(id, Feature::Video);
    assert_eq!(feature.error, None);
    assert_eq!(
        feature.warning.as_deref(),
        Some("5 of 5 scene images could not be generated.")
    );
}

#[tokio::test]
async fn diagram_source_round_trips_through_the_store() {
    let state = engine(Arc::new(InMemoryStore::new()));
    let id = explained_material(&state).await.id;

    state.generate_diagram(id).await.unwrap();

    assert_eq!(
        state.store.get(id).await.unwrap().diagram,
        Some(Diagram::Source("graph TD\nA --> B".into()))
    );
    assert_eq!(state.tracker.state(id, Feature::Diagram).error, None);
}

#[tokio::test]
async fn unrenderable_diagram_stores_the_sentinel_and_an_error() {
    let mut state = engine(Arc::new(InMemoryStore::new()));
    state.diagram = Arc::new(StaticDiagram {
        result: Diagram::Failed,
    });
    let id = explained_material(&state).await.id;

    state.generate_diagram(id).await.unwrap();

    assert_eq!(
        state.store.get(id).await.unwrap().diagram,
        Some(Diagram::Failed)
    );
    assert!(state
        .tracker
        .state(id, Feature::Diagram)
        .error
        .unwrap()
        .contains("flowchart syntax"));
}

//=========================================================================================
// Chat Workflow
//=========================================================================================

#[tokio::test]
async fn chat_success_appends_the_user_turn_then_the_reply() {
    let state = engine(Arc::new(InMemoryStore::new()));
    let id = seeded_material(&state).await.id;
    state
        .store
        .apply(
            id,
            FieldUpdate::AppendChat(vec![
                ChatMessage::user("first question"),
                ChatMessage::ai("first answer", Vec::new()),
            ]),
        )
        .await
        .unwrap();

    state.send_chat_message(id, "what about light?", false).await.unwrap();

    let history = state.store.get(id).await.unwrap().chat_history;
    let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "first question",
            "first answer",
            "what about light?",
            "a helpful reply"
        ]
    );
    assert_eq!(state.tracker.state(id, Feature::Chat).error, None);
}

#[tokio::test]
async fn chat_reply_carries_grounding_sources() {
    let mut state = engine(Arc::new(InMemoryStore::new()));
    state.chat = Arc::new(ScriptedChat {
        script: ChatScript::Reply(
            "grounded answer".into(),
            vec![GroundingSource {
                uri: "https://nih.gov/atp".into(),
                title: Some("NIH".into()),
            }],
        ),
    });
    let id = seeded_material(&state).await.id;

    state.send_chat_message(id, "cite something", true).await.unwrap();

    let history = state.store.get(id).await.unwrap().chat_history;
    let reply = history.last().unwrap();
    assert_eq!(reply.sources.len(), 1);
    assert_eq!(reply.sources[0].uri, "https://nih.gov/atp");
}

#[tokio::test]
async fn chat_failure_appends_one_apology_over_the_latest_history() {
    let store = Arc::new(InMemoryStore::new());
    let mut state = engine(store.clone());
    let id = seeded_material(&state).await.id;
    state.chat = Arc::new(ScriptedChat {
        script: ChatScript::InterleaveThenFail(store, id),
    });

    state.send_chat_message(id, "doomed question", false).await.unwrap();

    let history = state.store.get(id).await.unwrap().chat_history;
    let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
    // The message appended mid-request survives; the apology lands after it.
    assert_eq!(texts, vec!["doomed question", "interleaved note", CHAT_APOLOGY]);
    assert!(state
        .tracker
        .state(id, Feature::Chat)
        .error
        .unwrap()
        .contains("connection reset"));
}

//=========================================================================================
// Store Write Failures
//=========================================================================================

#[tokio::test]
async fn failed_store_write_still_settles_the_feature_state() {
    let inner = Arc::new(InMemoryStore::new());
    let mut state = engine(inner.clone());
    state.store = Arc::new(FailingApplyStore {
        inner: inner.clone(),
    });
    let id = seeded_material(&state).await.id;

    state.generate_explanation(id).await.unwrap();

    let feature = state.tracker.state(id, Feature::Explanation);
    assert!(!feature.in_progress, "in-progress must clear on a failed write");
    assert!(feature.error.unwrap().contains("write rejected"));
    assert!(inner.get(id).await.unwrap().ai_explanation.is_none());
}

//=========================================================================================
// Fencing Under Overlapping Invocations
//=========================================================================================

#[tokio::test]
async fn stale_explanation_completion_is_discarded() {
    let started = Arc::new(Semaphore::new(0));
    let release = Arc::new(Semaphore::new(0));
    let mut state = engine(Arc::new(InMemoryStore::new()));
    state.explain = Arc::new(GatedExplain {
        started: started.clone(),
        release: release.clone(),
        calls: AtomicUsize::new(0),
    });
    let id = seeded_material(&state).await.id;

    let racing = {
        let state = state.clone();
        tokio::spawn(async move { state.generate_explanation(id).await })
    };
    // Wait until the first invocation is parked inside the gateway, then let
    // a second invocation overtake it.
    started.acquire().await.unwrap().forget();
    state.generate_explanation(id).await.unwrap();
    release.add_permits(1);
    racing.await.unwrap().unwrap();

    let stored = state.store.get(id).await.unwrap();
    assert_eq!(stored.ai_explanation.as_deref(), Some("fresh explanation"));
    let feature = state.tracker.state(id, Feature::Explanation);
    assert!(!feature.in_progress);
    assert_eq!(feature.error, None);
}

#[tokio::test]
async fn stale_write_cannot_land_after_a_newer_one_committed() {
    let started = Arc::new(Semaphore::new(0));
    let release = Arc::new(Semaphore::new(0));
    let inner = Arc::new(InMemoryStore::new());
    let mut state = engine(inner.clone());
    state.store = Arc::new(GatedApplyStore {
        inner: inner.clone(),
        started: started.clone(),
        release: release.clone(),
        gated: AtomicUsize::new(0),
    });
    state.explain = Arc::new(SequencedExplain::new(vec![
        "stale explanation",
        "fresh explanation",
    ]));
    let id = seeded_material(&state).await.id;

    let racing = {
        let state = state.clone();
        tokio::spawn(async move { state.generate_explanation(id).await })
    };
    // Wait until the first invocation is parked inside its store write — past
    // its own freshness check — then start a second invocation behind it.
    started.acquire().await.unwrap().forget();
    let overtaking = {
        let state = state.clone();
        tokio::spawn(async move { state.generate_explanation(id).await })
    };
    release.add_permits(1);
    racing.await.unwrap().unwrap();
    overtaking.await.unwrap().unwrap();

    assert_eq!(
        inner.get(id).await.unwrap().ai_explanation.as_deref(),
        Some("fresh explanation")
    );
}

//=========================================================================================
// Progress Reporting
//=========================================================================================

#[tokio::test]
async fn presentation_progress_reaches_the_observable_line() {
    let state = engine(Arc::new(InMemoryStore::new()));
    let id = explained_material(&state).await.id;
    let mut progress = state.tracker.progress();

    state.generate_presentation(id).await.unwrap();

    let seen = tokio::time::timeout(
        Duration::from_secs(1),
        progress.wait_for(|line| line == "Presentation ready."),
    )
    .await;
    assert!(seen.is_ok(), "final progress line never arrived");
}
