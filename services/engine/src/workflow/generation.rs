//! services/engine/src/workflow/generation.rs
//!
//! The per-feature generation workflows. Each one runs the same shape:
//! mark the feature in-progress, call the gateway, merge the result into the
//! addressed material field, and always clear in-progress on completion —
//! success, failure, or a failed store write alike. Gateway failures never
//! propagate past this layer; they become feature-scoped messages in the
//! tracker.

use studyforge_core::{
    domain::{Diagram, NewMaterial, NoteLength, QuizQuestion, StudyMaterial},
    ports::{FieldUpdate, PortResult, ProgressSink},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::workflow::state::{EngineState, Feature};

/// The blocking message shown when a downstream feature is requested before
/// an explanation exists. Checked before any gateway call.
pub const EXPLANATION_REQUIRED: &str =
    "An explanation must be generated first. Generate one, then try again.";

impl EngineState {
    //=====================================================================================
    // Material Management
    //=====================================================================================

    /// Creates a new material record and returns it.
    pub async fn create_material(&self, input: NewMaterial) -> Result<StudyMaterial, EngineError> {
        let material = StudyMaterial::new(input);
        info!(material_id = %material.id, title = %material.title, "material created");
        self.store.create(material.clone()).await?;
        Ok(material)
    }

    /// Looks up one material by id.
    pub async fn material(&self, id: Uuid) -> Result<StudyMaterial, EngineError> {
        Ok(self.store.get(id).await?)
    }

    /// Lists every material, oldest first.
    pub async fn list_materials(&self) -> Result<Vec<StudyMaterial>, EngineError> {
        Ok(self.store.list().await?)
    }

    //=====================================================================================
    // Single-Phase Workflows
    //=====================================================================================

    pub async fn generate_summary(&self, id: Uuid) -> Result<(), EngineError> {
        let material = self.store.get(id).await?;
        let token = self.tracker.begin(id, Feature::Summary);
        info!(material_id = %id, "summary generation started");

        let result = self.notes.generate_summary(&material.extracted_text).await;
        let outcome = self
            .commit(id, Feature::Summary, token, result.map(FieldUpdate::Summary))
            .await;
        self.tracker.finish(id, Feature::Summary, token, outcome);
        Ok(())
    }

    pub async fn generate_explanation(&self, id: Uuid) -> Result<(), EngineError> {
        let material = self.store.get(id).await?;
        let token = self.tracker.begin(id, Feature::Explanation);
        info!(material_id = %id, "explanation generation started");

        let result = self
            .explain
            .generate_explanation(&material.extracted_text)
            .await;
        let outcome = self
            .commit(
                id,
                Feature::Explanation,
                token,
                result.map(FieldUpdate::Explanation),
            )
            .await;
        self.tracker.finish(id, Feature::Explanation, token, outcome);
        Ok(())
    }

    pub async fn generate_notes(&self, id: Uuid, length: NoteLength) -> Result<(), EngineError> {
        let material = self.store.get(id).await?;
        let token = self.tracker.begin(id, Feature::Notes);
        info!(material_id = %id, ?length, "notes generation started");

        let result = self
            .notes
            .generate_notes(&material.extracted_text, length)
            .await;
        let outcome = self
            .commit(
                id,
                Feature::Notes,
                token,
                result.map(|text| FieldUpdate::Note(length, text)),
            )
            .await;
        self.tracker.finish(id, Feature::Notes, token, outcome);
        Ok(())
    }

    /// Generates a quiz and hands it straight back to the caller; quizzes are
    /// taken interactively and never stored on the material. `None` means the
    /// generation failed and the tracker carries the message.
    pub async fn generate_quiz(&self, id: Uuid) -> Result<Option<Vec<QuizQuestion>>, EngineError> {
        let material = self.store.get(id).await?;
        let token = self.tracker.begin(id, Feature::Quiz);
        info!(material_id = %id, "quiz generation started");

        match self.quiz.generate_quiz(&material.extracted_text).await {
            Ok(questions) => {
                self.tracker.finish(id, Feature::Quiz, token, Ok(()));
                Ok(Some(questions))
            }
            Err(e) => {
                self.tracker
                    .finish(id, Feature::Quiz, token, Err(e.to_string()));
                Ok(None)
            }
        }
    }

    pub async fn generate_diagram(&self, id: Uuid) -> Result<(), EngineError> {
        let material = self.store.get(id).await?;
        let token = self.tracker.begin(id, Feature::Diagram);

        let Some(explanation) = material.explanation() else {
            self.tracker
                .finish(id, Feature::Diagram, token, Err(EXPLANATION_REQUIRED.into()));
            return Ok(());
        };
        info!(material_id = %id, "diagram generation started");

        let outcome = match self.diagram.generate_diagram(explanation).await {
            Ok(diagram) => {
                let unrenderable = diagram == Diagram::Failed;
                let committed = self
                    .commit(
                        id,
                        Feature::Diagram,
                        token,
                        Ok(FieldUpdate::Diagram(diagram)),
                    )
                    .await;
                match committed {
                    // The sentinel is stored so the UI shows a stable failed
                    // state, and the feature error explains it.
                    Ok(()) if unrenderable => {
                        Err("The diagram could not be expressed in valid flowchart syntax."
                            .to_string())
                    }
                    other => other,
                }
            }
            Err(e) => Err(e.to_string()),
        };
        self.tracker.finish(id, Feature::Diagram, token, outcome);
        Ok(())
    }

    //=====================================================================================
    // Two-Phase Workflows (content first, then images)
    //=====================================================================================

    pub async fn generate_presentation(&self, id: Uuid) -> Result<(), EngineError> {
        let material = self.store.get(id).await?;
        let token = self.tracker.begin(id, Feature::Presentation);

        let Some(explanation) = material.explanation() else {
            self.tracker.finish(
                id,
                Feature::Presentation,
                token,
                Err(EXPLANATION_REQUIRED.into()),
            );
            return Ok(());
        };
        info!(material_id = %id, "presentation generation started");

        let progress = self.progress_sink();
        let outcome = self
            .run_presentation(id, token, explanation, &progress)
            .await;
        match outcome {
            Ok(warning) => {
                if let Some(message) = warning {
                    warn!(material_id = %id, %message, "presentation degraded");
                    self.tracker.warn(id, Feature::Presentation, token, message);
                }
                self.tracker.finish(id, Feature::Presentation, token, Ok(()));
            }
            Err(message) => {
                self.tracker
                    .finish(id, Feature::Presentation, token, Err(message));
            }
        }
        Ok(())
    }

    /// Phase 1 writes the outline so a partial result survives a later image
    /// failure; phase 2 fills in slide images. All images failing rolls the
    /// field back to absent — policy is to not show a deck known to be
    /// visually incomplete everywhere. Some failing keeps the deck and
    /// surfaces a warning.
    async fn run_presentation(
        &self,
        id: Uuid,
        token: u64,
        explanation: &str,
        progress: &ProgressSink,
    ) -> Result<Option<String>, String> {
        progress.report("Designing the slide deck...");
        let outline = self
            .slides
            .generate_outline(explanation)
            .await
            .map_err(|e| e.to_string())?;

        {
            let _commits = self.tracker.lock_commits().await;
            if !self.tracker.is_latest(id, Feature::Presentation, token) {
                debug!(material_id = %id, "stale presentation outline discarded");
                return Ok(None);
            }
            self.store
                .apply(id, FieldUpdate::Presentation(Some(outline.clone())))
                .await
                .map_err(|e| e.to_string())?;
        }

        let mut deck = outline;
        let total = deck.slides.len();
        let mut missing = 0usize;
        for (index, slide) in deck.slides.iter_mut().enumerate() {
            progress.report(format!("Illustrating slide {} of {}...", index + 1, total));
            match self.images.generate_image(&slide.image_prompt).await {
                Ok(Some(url)) => slide.image_url = Some(url),
                Ok(None) => missing += 1,
                Err(e) => {
                    warn!(material_id = %id, error = %e, "slide illustration failed");
                    missing += 1;
                }
            }
        }

        let _commits = self.tracker.lock_commits().await;
        if !self.tracker.is_latest(id, Feature::Presentation, token) {
            debug!(material_id = %id, "stale presentation images discarded");
            return Ok(None);
        }
        if total > 0 && missing == total {
            self.store
                .apply(id, FieldUpdate::Presentation(None))
                .await
                .map_err(|e| e.to_string())?;
            return Err(
                "No slide images could be generated; the presentation was discarded.".to_string(),
            );
        }
        self.store
            .apply(id, FieldUpdate::Presentation(Some(deck)))
            .await
            .map_err(|e| e.to_string())?;
        progress.report("Presentation ready.");
        Ok((missing > 0)
            .then(|| format!("{missing} of {total} slide images could not be generated.")))
    }

    pub async fn generate_video(&self, id: Uuid) -> Result<(), EngineError> {
        let material = self.store.get(id).await?;
        let token = self.tracker.begin(id, Feature::Video);

        let Some(explanation) = material.explanation() else {
            self.tracker
                .finish(id, Feature::Video, token, Err(EXPLANATION_REQUIRED.into()));
            return Ok(());
        };
        info!(material_id = %id, "video generation started");

        let progress = self.progress_sink();
        let outcome = self.run_video(id, token, explanation, &progress).await;
        match outcome {
            Ok(warning) => {
                if let Some(message) = warning {
                    warn!(material_id = %id, %message, "video degraded");
                    self.tracker.warn(id, Feature::Video, token, message);
                }
                self.tracker.finish(id, Feature::Video, token, Ok(()));
            }
            Err(message) => {
                self.tracker.finish(id, Feature::Video, token, Err(message));
            }
        }
        Ok(())
    }

    /// Same two-phase shape as the presentation, but the narration scripts
    /// are the deliverable: image failures, even total ones, keep the scenes.
    async fn run_video(
        &self,
        id: Uuid,
        token: u64,
        explanation: &str,
        progress: &ProgressSink,
    ) -> Result<Option<String>, String> {
        progress.report("Writing the script...");
        let scenes = self
            .video
            .generate_scenes(explanation)
            .await
            .map_err(|e| e.to_string())?;

        {
            let _commits = self.tracker.lock_commits().await;
            if !self.tracker.is_latest(id, Feature::Video, token) {
                debug!(material_id = %id, "stale video script discarded");
                return Ok(None);
            }
            self.store
                .apply(id, FieldUpdate::VideoScenes(scenes.clone()))
                .await
                .map_err(|e| e.to_string())?;
        }

        let mut filled = scenes;
        let total = filled.len();
        let mut missing = 0usize;
        for (index, scene) in filled.iter_mut().enumerate() {
            progress.report(format!("Rendering scene {} of {}...", index + 1, total));
            match self.images.generate_image(&scene.image_prompt).await {
                Ok(Some(url)) => scene.image_url = Some(url),
                Ok(None) => missing += 1,
                Err(e) => {
                    warn!(material_id = %id, error = %e, "scene illustration failed");
                    missing += 1;
                }
            }
        }

        let _commits = self.tracker.lock_commits().await;
        if !self.tracker.is_latest(id, Feature::Video, token) {
            debug!(material_id = %id, "stale video images discarded");
            return Ok(None);
        }
        self.store
            .apply(id, FieldUpdate::VideoScenes(filled))
            .await
            .map_err(|e| e.to_string())?;
        progress.report("Video ready.");
        Ok((missing > 0)
            .then(|| format!("{missing} of {total} scene images could not be generated.")))
    }

    //=====================================================================================
    // Shared Commit Helper
    //=====================================================================================

    /// Applies a successful result's field update if this invocation is still
    /// the latest for its key; converts every failure into a feature-scoped
    /// message for the tracker.
    async fn commit(
        &self,
        id: Uuid,
        feature: Feature,
        token: u64,
        result: PortResult<FieldUpdate>,
    ) -> Result<(), String> {
        match result {
            Ok(update) => {
                let _commits = self.tracker.lock_commits().await;
                if !self.tracker.is_latest(id, feature, token) {
                    debug!(material_id = %id, ?feature, "stale completion discarded");
                    return Ok(());
                }
                self.store
                    .apply(id, update)
                    .await
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        }
    }
}
