//! services/engine/src/adapters/diagram_llm.rs
//!
//! This module contains the adapter for the block-diagram LLM.
//! It implements the `DiagramService` port from the `core` crate. The model's
//! output must satisfy a strict flowchart grammar; output that cannot be
//! repaired comes back as the `Diagram::Failed` sentinel rather than an
//! error, so callers never see ambiguous half-valid source.

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use regex::Regex;
use studyforge_core::{
    domain::Diagram,
    ports::{DiagramService, PortResult},
};
use tracing::warn;

use crate::retry::{with_retry, RetryConfig};

const SYSTEM_INSTRUCTIONS: &str = r#"You are a diagram author. Express the structure of the provided explanation as a flowchart.

Respond with ONLY flowchart source, no prose and no code fences. The grammar:
- First line: "graph TD" or "graph LR".
- Each following line is a node or an edge, for example:
    A[Input text]
    A --> B[Tokenizer]
    B -->|tokens| C{Valid?}
- Node ids are alphanumeric. Labels go in [], (), or {}. Edge labels go in |...|.
- At most 12 nodes. No styling directives, no subgraphs."#;

/// Validates a candidate against the flowchart grammar line by line.
fn is_valid_flowchart(source: &str) -> bool {
    // Static patterns; compilation cannot fail.
    let header_re = Regex::new(r"^(graph|flowchart)\s+(TD|TB|LR|RL|BT)$").unwrap();
    let node = r"[A-Za-z][A-Za-z0-9_]*(\[[^\[\]]+\]|\([^()]+\)|\{[^{}]+\})?";
    let edge_re = Regex::new(&format!(
        r"^{node}(\s*-->(\|[^|]+\|)?\s*{node})*$"
    ))
    .unwrap();

    let mut lines = source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("%%"));

    let Some(header) = lines.next() else {
        return false;
    };
    if !header_re.is_match(header) {
        return false;
    }

    let mut saw_body = false;
    for line in lines {
        if !edge_re.is_match(line) {
            return false;
        }
        saw_body = true;
    }
    saw_body
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `DiagramService` using an OpenAI-compatible
/// LLM.
#[derive(Clone)]
pub struct OpenAiDiagramAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    retry: RetryConfig,
}

impl OpenAiDiagramAdapter {
    /// Creates a new `OpenAiDiagramAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self {
            client,
            model,
            retry: RetryConfig::default(),
        }
    }
}

//=========================================================================================
// `DiagramService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DiagramService for OpenAiDiagramAdapter {
    async fn generate_diagram(&self, explanation: &str) -> PortResult<Diagram> {
        let user_input = format!("Diagram this explanation:\n\n{}", explanation);

        let first = with_retry(&self.retry, "generate_diagram", || {
            super::chat_complete(&self.client, &self.model, SYSTEM_INSTRUCTIONS, &user_input)
        })
        .await?;

        let candidate = super::strip_code_fences(&first).to_string();
        if is_valid_flowchart(&candidate) {
            return Ok(Diagram::Source(candidate));
        }

        // One corrective round: show the model its invalid output and ask
        // for a repaired version.
        warn!("diagram output failed grammar check, requesting a repair");
        let repair_input = format!(
            "Your previous output was not valid flowchart source:\n\n{}\n\n\
             Rewrite it so every line satisfies the grammar. Respond with only the source.",
            candidate
        );
        let second = with_retry(&self.retry, "repair_diagram", || {
            super::chat_complete(&self.client, &self.model, SYSTEM_INSTRUCTIONS, &repair_input)
        })
        .await?;

        let repaired = super::strip_code_fences(&second).to_string();
        if is_valid_flowchart(&repaired) {
            Ok(Diagram::Source(repaired))
        } else {
            warn!("diagram repair also failed grammar check, returning sentinel");
            Ok(Diagram::Failed)
        }
    }
}
