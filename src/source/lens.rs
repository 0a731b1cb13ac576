use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use super::{DepositQuery, PatentSnapshot, PatentSource, decode_document, decode_total};
use crate::config::LensConfig;
use crate::constants::lens::{API_KEY_ENV, RETRYABLE_STATUSES, SOURCE_ID};
use crate::data::PatentDocument;
use crate::errors::MinerError;
use crate::retry::run_with_retry;
use crate::types::DocumentId;

/// Patent search over the Lens scholarly/patent HTTP API.
pub struct LensSource {
    config: LensConfig,
    agent: ureq::Agent,
}

impl LensSource {
    /// Build a source; fails when no API key is configured.
    pub fn new(config: LensConfig) -> Result<Self, MinerError> {
        if config.api_key.trim().is_empty() {
            return Err(MinerError::Configuration(format!(
                "missing search API key (set {API_KEY_ENV})"
            )));
        }
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();
        Ok(Self { config, agent })
    }

    /// Active configuration.
    pub fn config(&self) -> &LensConfig {
        &self.config
    }

    fn post(&self, label: &str, payload: &Value) -> Result<Value, MinerError> {
        let body = payload.to_string();
        run_with_retry(&self.config.retry, label, |attempt| {
            debug!("[biobroker:lens] {label} attempt {attempt}");
            self.post_once(&body).into()
        })
    }

    fn post_once(&self, body: &str) -> Result<Value, MinerError> {
        let response = self
            .agent
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .send(body)
            .map_err(|err| unavailable(format!("request failed: {err}")))?;
        let status = response.status().as_u16();
        let mut response_body = response.into_body();
        let text = response_body
            .with_config()
            .limit(self.config.max_body_bytes)
            .read_to_string()
            .map_err(|err| match err {
                ureq::Error::BodyExceedsLimit(limit) => MinerError::Configuration(format!(
                    "response body exceeds {limit} bytes; lower the page size or raise max_body_bytes"
                )),
                other => unavailable(format!("failed reading response body: {other}")),
            })?;
        classify_response(status, &text)
    }
}

fn unavailable(reason: String) -> MinerError {
    MinerError::SourceUnavailable {
        source_id: SOURCE_ID.to_string(),
        reason,
    }
}

/// Map an HTTP status and body to a decoded body or a retryable/fatal error.
fn classify_response(status: u16, body: &str) -> Result<Value, MinerError> {
    if RETRYABLE_STATUSES.contains(&status) {
        return Err(unavailable(format!("status {status}")));
    }
    if !(200..300).contains(&status) {
        return Err(MinerError::SourceRejected {
            source_id: SOURCE_ID.to_string(),
            status,
            details: body.chars().take(300).collect(),
        });
    }
    Ok(serde_json::from_str(body)?)
}

fn decode_hits(body: &Value) -> Vec<PatentDocument> {
    body.get("data")
        .and_then(Value::as_array)
        .map(|hits| hits.iter().filter_map(decode_document).collect())
        .unwrap_or_default()
}

impl PatentSource for LensSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    fn count_matching(&self, query: &DepositQuery) -> Result<u64, MinerError> {
        let body = self.post("count", &query.count_payload())?;
        let total = decode_total(&body);
        info!("[biobroker:lens] {total} matching patents reported");
        Ok(total)
    }

    fn refresh(
        &self,
        query: &DepositQuery,
        cursor: Option<&str>,
    ) -> Result<PatentSnapshot, MinerError> {
        let payload = match cursor {
            None => query.scan_payload(self.config.page_size, &self.config.scroll_ttl),
            Some(scroll_id) => DepositQuery::continuation_payload(scroll_id, &self.config.scroll_ttl),
        };
        let body = self.post("scan", &payload)?;
        let documents = decode_hits(&body);
        let cursor = if documents.is_empty() {
            None
        } else {
            body.get("scroll_id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        };
        Ok(PatentSnapshot { documents, cursor })
    }

    fn fetch_by_ids(&self, ids: &[DocumentId]) -> Result<Vec<PatentDocument>, MinerError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = self.post("lookup", &DepositQuery::lookup_payload(ids))?;
        Ok(decode_hits(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarRegistry;
    use crate::retry::RetryPolicy;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }

    fn serve_once(payload: Vec<u8>) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            let headers = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                payload.len()
            );
            let _ = stream.write_all(headers.as_bytes());
            let _ = stream.write_all(&payload);
            let _ = stream.flush();
        });
        (format!("http://{addr}"), handle)
    }

    fn large_page(documents: usize, text_bytes: usize) -> Vec<u8> {
        let text = "x".repeat(text_bytes);
        let data: Vec<Value> = (0..documents)
            .map(|idx| json!({ "lens_id": format!("doc-{idx}"), "description": { "text": text } }))
            .collect();
        json!({ "data": data, "scroll_id": "s1" }).to_string().into_bytes()
    }

    fn source_for(endpoint: String, max_body_bytes: u64) -> LensSource {
        LensSource::new(LensConfig {
            endpoint,
            api_key: "key".into(),
            retry: RetryPolicy::immediate(1),
            max_body_bytes,
            ..LensConfig::default()
        })
        .unwrap()
    }

    fn query() -> DepositQuery {
        DepositQuery::for_registry(&GrammarRegistry::builtin().unwrap())
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let err = LensSource::new(LensConfig::default()).err().unwrap();
        assert!(matches!(err, MinerError::Configuration(_)));
    }

    #[test]
    fn retryable_statuses_are_transient() {
        for status in [429, 500, 502, 503, 504] {
            let err = classify_response(status, "").unwrap_err();
            assert!(err.is_transient());
        }
    }

    #[test]
    fn client_errors_are_fatal_with_status() {
        match classify_response(401, "bad token") {
            Err(err @ MinerError::SourceRejected { .. }) => {
                assert!(!err.is_transient());
                let MinerError::SourceRejected {
                    status, details, ..
                } = err
                else {
                    unreachable!();
                };
                assert_eq!(status, 401);
                assert_eq!(details, "bad token");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn unparseable_success_bodies_are_not_retried() {
        let err = classify_response(200, "not json").unwrap_err();
        assert!(matches!(err, MinerError::Json(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn success_bodies_decode_hits() {
        let body = classify_response(
            200,
            r#"{"data":[{"lens_id":"a","description":{"text":"d"}},{"no":"id"}],"scroll_id":"s1"}"#,
        )
        .unwrap();
        let docs = decode_hits(&body);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].description, "d");
        assert!(decode_hits(&json!({})).is_empty());
    }

    #[test]
    fn full_text_pages_larger_than_ten_mebibytes_decode() {
        let payload = large_page(100, 120_000);
        assert!(payload.len() > 10 * 1024 * 1024);
        let (endpoint, handle) = serve_once(payload);
        let source = source_for(endpoint, LensConfig::default().max_body_bytes);

        let snapshot = source.refresh(&query(), None).unwrap();
        handle.join().unwrap();
        assert_eq!(snapshot.documents.len(), 100);
        assert_eq!(snapshot.documents[99].document_id, "doc-99");
        assert_eq!(snapshot.documents[0].description.len(), 120_000);
        assert_eq!(snapshot.cursor.as_deref(), Some("s1"));
    }

    #[test]
    fn bodies_over_the_configured_limit_fail_without_retry() {
        let (endpoint, handle) = serve_once(large_page(4, 4_096));
        let source = source_for(endpoint, 1_024);

        let err = source.refresh(&query(), None).unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, MinerError::Configuration(_)));
    }
}
