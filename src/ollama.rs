//! Minimal JSON-over-HTTP client for a local Ollama server.

use std::time::Duration;

use serde_json::Value;

/// Shared agent plus base URL for generation and embedding calls.
pub(crate) struct OllamaHttp {
    base: String,
    agent: ureq::Agent,
}

impl OllamaHttp {
    pub(crate) fn new(endpoint: &str, timeout_secs: u64) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            base: endpoint.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// POST `payload` to `path` and decode the JSON reply.
    pub(crate) fn post(&self, path: &str, payload: &Value) -> Result<Value, String> {
        let url = self.url(path);
        let response = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .send(payload.to_string())
            .map_err(|err| format!("{url}: request failed: {err}"))?;
        let status = response.status().as_u16();
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|err| format!("{url}: failed reading body: {err}"))?;
        if !(200..300).contains(&status) {
            let details: String = body.chars().take(300).collect();
            return Err(format!("{url}: status {status}: {details}"));
        }
        serde_json::from_str(&body).map_err(|err| format!("{url}: invalid json: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let http = OllamaHttp::new("http://127.0.0.1:11434/", 5);
        assert_eq!(http.url("/api/embed"), "http://127.0.0.1:11434/api/embed");
    }
}
