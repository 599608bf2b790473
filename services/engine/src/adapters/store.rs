//! services/engine/src/adapters/store.rs
//!
//! The in-memory content store. It implements the `ContentStore` port from
//! the `core` crate: a keyed collection of study materials supporting
//! get-by-id and addressed, field-scoped merges. Durability beyond the
//! process lifetime is the embedder's concern.

use std::collections::HashMap;

use async_trait::async_trait;
use studyforge_core::{
    domain::StudyMaterial,
    ports::{ContentStore, FieldUpdate, PortError, PortResult},
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A `ContentStore` backed by a process-local map.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<Uuid, StudyMaterial>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn create(&self, material: StudyMaterial) -> PortResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&material.id) {
            return Err(PortError::Unexpected(format!(
                "material {} already exists",
                material.id
            )));
        }
        records.insert(material.id, material);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> PortResult<StudyMaterial> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("material {id}")))
    }

    async fn apply(&self, id: Uuid, update: FieldUpdate) -> PortResult<()> {
        let mut records = self.records.write().await;
        let material = records
            .get_mut(&id)
            .ok_or_else(|| PortError::NotFound(format!("material {id}")))?;

        // Each arm touches exactly one field.
        match update {
            FieldUpdate::Summary(text) => material.summary = Some(text),
            FieldUpdate::Explanation(text) => material.ai_explanation = Some(text),
            FieldUpdate::Note(length, text) => {
                material.notes.insert(length, text);
            }
            FieldUpdate::Presentation(presentation) => material.presentation = presentation,
            FieldUpdate::Diagram(diagram) => material.diagram = Some(diagram),
            FieldUpdate::VideoScenes(scenes) => material.video_scenes = Some(scenes),
            // Appending under the store's write lock makes the latest stored
            // history the base, whatever the caller read earlier.
            FieldUpdate::AppendChat(messages) => material.chat_history.extend(messages),
        }
        Ok(())
    }

    async fn list(&self) -> PortResult<Vec<StudyMaterial>> {
        let records = self.records.read().await;
        let mut all: Vec<StudyMaterial> = records.values().cloned().collect();
        all.sort_by_key(|m| m.created_at);
        Ok(all)
    }
}
