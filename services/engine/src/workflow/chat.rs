//! services/engine/src/workflow/chat.rs
//!
//! The chat workflow: one conversation per material, append-only history.
//! The user's message lands in the store optimistically before the gateway
//! call; the reply (or a single assistant-voiced apology on failure) is
//! appended afterwards. Appends go through the store's own lock, so messages
//! added while a request was in flight are never clobbered.

use studyforge_core::{
    domain::{ChatMessage, StudyMaterial},
    ports::{ChatContext, FieldUpdate},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::workflow::state::{EngineState, Feature};

/// How much of the source text is quoted into the chat system instruction.
const CHAT_EXCERPT_CHARS: usize = 2000;

/// The assistant-voiced message appended when the gateway call fails.
pub const CHAT_APOLOGY: &str =
    "Sorry, I ran into a problem answering that. Please try asking again.";

impl EngineState {
    /// Sends one user turn for the material's conversation. `grounded` asks
    /// for a web-grounded answer with citations; it applies to this message
    /// only, never stickily to the session.
    pub async fn send_chat_message(
        &self,
        id: Uuid,
        text: &str,
        grounded: bool,
    ) -> Result<(), EngineError> {
        let material = self.store.get(id).await?;
        let token = self.tracker.begin(id, Feature::Chat);
        info!(material_id = %id, grounded, "chat turn started");

        let outcome = self.run_chat(id, &material, text, grounded).await;
        self.tracker.finish(id, Feature::Chat, token, outcome);
        Ok(())
    }

    async fn run_chat(
        &self,
        id: Uuid,
        material: &StudyMaterial,
        text: &str,
        grounded: bool,
    ) -> Result<(), String> {
        // The history as of this turn; the gateway replays it when it seeds
        // a fresh session.
        let history = material.chat_history.clone();

        self.store
            .apply(id, FieldUpdate::AppendChat(vec![ChatMessage::user(text)]))
            .await
            .map_err(|e| e.to_string())?;

        let ctx = ChatContext::for_material(material, CHAT_EXCERPT_CHARS);
        match self.chat.send_message(&ctx, &history, text, grounded).await {
            Ok(reply) => {
                let message = ChatMessage::ai(reply.text, reply.sources);
                self.store
                    .apply(id, FieldUpdate::AppendChat(vec![message]))
                    .await
                    .map_err(|e| e.to_string())
            }
            Err(e) => {
                warn!(material_id = %id, error = %e, "chat gateway failed");
                // The failure surfaces inside the transcript, as if spoken
                // by the assistant, and as a feature-scoped error.
                let apology = ChatMessage::ai(CHAT_APOLOGY, Vec::new());
                self.store
                    .apply(id, FieldUpdate::AppendChat(vec![apology]))
                    .await
                    .map_err(|store_err| store_err.to_string())?;
                Err(e.to_string())
            }
        }
    }
}
