//! Text-generation collaborator used by the enrichment stage.

use serde_json::{Value, json};
use tracing::info;

use crate::config::OllamaConfig;
use crate::constants::enrichment::{KEEP_ALIVE, READINESS_PROMPT, REPAIR_PROMPT_PREFIX};
use crate::errors::MinerError;
use crate::ollama::OllamaHttp;

/// Synchronous prompt-in, text-out generator.
pub trait TextGenerator {
    /// Free-text answer for `prompt`.
    fn generate(&mut self, prompt: &str) -> Result<String, MinerError>;

    /// Send a trivial prompt to confirm the generator answers at all.
    fn probe(&mut self) -> Result<(), MinerError> {
        self.generate(READINESS_PROMPT).map(|_| ())
    }
}

/// Prompt asking for the structured description of one deposit.
///
/// The snippet is cut to `snippet_chars` characters.
pub fn enrichment_prompt(
    title: &str,
    snippet: &str,
    accession_id: &str,
    snippet_chars: usize,
) -> String {
    let snippet: String = snippet.chars().take(snippet_chars).collect();
    format!(
        r#"Analyze this biological patent.

PATENT TITLE: "{title}"
CONTEXT SNIPPET: "{snippet}"

Task: Identify the biological material deposited as "{accession_id}".

Return a JSON object with:
1. "name": Scientific species name (e.g. Escherichia coli). Use the Title as a hint.
2. "strain": Specific strain ID (e.g. K-12).
3. "category": (Bacteria, Fungi, Mammalian Cell Line, Virus, Plasmid, Other).
4. "application": Industrial use (e.g. Antibody production).

If a field is not found, use "Unknown". JSON ONLY."#
    )
}

/// Follow-up prompt asking the generator to isolate the object in its own output.
pub fn repair_prompt(raw: &str) -> String {
    format!("{REPAIR_PROMPT_PREFIX}{raw}")
}

/// Generator backed by Ollama's `/api/generate`, non-streaming at temperature 0.
pub struct OllamaGenerator {
    http: OllamaHttp,
    model: String,
}

impl OllamaGenerator {
    /// Connect using the endpoint and generation model from `config`.
    pub fn new(config: &OllamaConfig) -> Self {
        info!(
            "[biobroker:generate] using model {} at {}",
            config.generation_model, config.endpoint
        );
        Self {
            http: OllamaHttp::new(&config.endpoint, config.timeout_secs),
            model: config.generation_model.clone(),
        }
    }

    fn payload(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "keep_alive": KEEP_ALIVE,
            "options": { "temperature": 0 },
        })
    }
}

impl TextGenerator for OllamaGenerator {
    fn generate(&mut self, prompt: &str) -> Result<String, MinerError> {
        let reply = self
            .http
            .post("/api/generate", &self.payload(prompt))
            .map_err(MinerError::Generation)?;
        reply
            .get("response")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| MinerError::Generation("reply is missing 'response'".to_string()))
    }
}
