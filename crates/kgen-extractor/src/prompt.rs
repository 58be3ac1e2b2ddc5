//! Prompt construction
//!
//! The prompt pins the reply to one JSON shape so that the parser has a
//! schema to validate against instead of free text.

use kgen_core::config::DEFAULT_TEMPERATURE;
use kgen_core::{OutputLanguage, PromptPayload};

/// JSON shape the LLM must reply with
pub const GRAPH_SCHEMA: &str = r#"{
  "nodes": [{"id": 1, "label": "entity name", "group": "entity type"}],
  "edges": [{"from": 1, "to": 2, "label": "relationship"}]
}"#;

/// Build the extraction prompt for a piece of text
///
/// Pure: identical inputs give identical payloads. The caller guarantees
/// `text` is not blank.
pub fn build_prompt(text: &str, language: OutputLanguage, temperature: f32) -> PromptPayload {
    PromptPayload {
        system: system_prompt(language),
        user: format!("Text:\n{}", text.trim()),
        temperature: clamp_temperature(temperature),
        language,
    }
}

fn system_prompt(language: OutputLanguage) -> String {
    format!(
        "You are a knowledge graph extraction engine. Read the user's text and extract \
the entities it mentions and the relationships between them.\n\
\n\
Reply with one JSON object and nothing else. Do not add explanations, prose or \
Markdown code fences. The object must have exactly this shape:\n\
{schema}\n\
\n\
Rules:\n\
- Every node has a unique \"id\" (integer or string), a non-empty \"label\" and a \
\"group\" naming its category, for example person, organization, place, concept or event.\n\
- Every edge connects two ids that appear in \"nodes\". \"from\" is the subject and \
\"to\" is the object of the relationship.\n\
- Every edge has a short, non-empty \"label\" describing the relationship.\n\
- Write every \"label\" and \"group\" value in {language}.\n\
- If the text mentions no entities, reply with {{\"nodes\": [], \"edges\": []}}.",
        schema = GRAPH_SCHEMA,
        language = language.name(),
    )
}

fn clamp_temperature(temperature: f32) -> f32 {
    if temperature.is_nan() {
        DEFAULT_TEMPERATURE
    } else {
        temperature.clamp(0.0, 1.0)
    }
}
