//! Patent search collaborators and the deposit query they answer.
//!
//! Ownership model:
//! - `DepositQuery` describes which patents are of interest and renders the
//!   wire payloads for scans, counts, and id lookups.
//! - `PatentSource` executes those payloads. `LensSource` talks HTTP;
//!   `InMemoryPatentSource` serves fixed documents for tests and offline runs.

use std::collections::HashSet;
use std::sync::Mutex;

use serde_json::{Value, json};

use crate::claims::flatten_claims;
use crate::constants::query::{
    BIO_IPC_PATTERNS, DEPOSIT_PHRASES, EXPIRED_STATUSES, FULL_TEXT_FIELD, ID_FIELD, IPC_FIELD,
    LEGAL_STATUS_FIELD, LOOKUP_FIELDS, MISSING_TITLE, SCAN_FIELDS,
};
use crate::data::PatentDocument;
use crate::errors::MinerError;
use crate::grammar::GrammarRegistry;
use crate::types::DocumentId;

/// HTTP search-service implementation.
pub mod lens;

pub use lens::LensSource;

/// One page of scan results.
///
/// Pass `cursor` back into the next `refresh`; `None` means the scan is exhausted.
#[derive(Clone, Debug, Default)]
pub struct PatentSnapshot {
    /// Documents on this page.
    pub documents: Vec<PatentDocument>,
    /// Continuation token for the next page.
    pub cursor: Option<String>,
}

/// External patent search service.
pub trait PatentSource: Send + Sync {
    /// Stable identifier used in errors and logs.
    fn id(&self) -> &str;

    /// Total number of patents matching `query`.
    fn count_matching(&self, query: &DepositQuery) -> Result<u64, MinerError>;

    /// Fetch the page after `cursor` (the first page when `None`).
    fn refresh(
        &self,
        query: &DepositQuery,
        cursor: Option<&str>,
    ) -> Result<PatentSnapshot, MinerError>;

    /// Full text for the given document ids. Unknown ids are omitted.
    fn fetch_by_ids(&self, ids: &[DocumentId]) -> Result<Vec<PatentDocument>, MinerError>;
}

/// Expired biological patents that mention a deposit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositQuery {
    statuses: Vec<String>,
    ipc_patterns: Vec<String>,
    keywords: Vec<String>,
}

impl DepositQuery {
    /// Query whose deposit keywords are the standard phrases plus every
    /// repository code known to `registry`.
    pub fn for_registry(registry: &GrammarRegistry) -> Self {
        let keywords = DEPOSIT_PHRASES
            .iter()
            .copied()
            .chain(registry.repository_codes())
            .map(str::to_string)
            .collect();
        Self {
            statuses: EXPIRED_STATUSES.iter().map(|s| s.to_string()).collect(),
            ipc_patterns: BIO_IPC_PATTERNS.iter().map(|s| s.to_string()).collect(),
            keywords,
        }
    }

    /// Full-text keywords, phrases first.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// The boolean criteria shared by every payload.
    pub fn criteria(&self) -> Value {
        let ipc: Vec<Value> = self
            .ipc_patterns
            .iter()
            .map(|code| json!({ "wildcard": { IPC_FIELD: code } }))
            .collect();
        let phrases: Vec<Value> = self
            .keywords
            .iter()
            .map(|kw| json!({ "match_phrase": { FULL_TEXT_FIELD: kw } }))
            .collect();
        json!({
            "bool": {
                "must": [
                    { "terms": { LEGAL_STATUS_FIELD: self.statuses } },
                    { "bool": { "should": ipc, "minimum_should_match": 1 } },
                    { "bool": { "should": phrases, "minimum_should_match": 1 } },
                ]
            }
        })
    }

    /// First scan request.
    pub fn scan_payload(&self, page_size: usize, scroll_ttl: &str) -> Value {
        json!({
            "query": self.criteria(),
            "size": page_size,
            "scroll": scroll_ttl,
            "include": SCAN_FIELDS,
        })
    }

    /// Follow-up scan request for an open scroll.
    pub fn continuation_payload(scroll_id: &str, scroll_ttl: &str) -> Value {
        json!({ "scroll_id": scroll_id, "scroll": scroll_ttl })
    }

    /// Count-only request.
    pub fn count_payload(&self) -> Value {
        json!({
            "query": self.criteria(),
            "size": 0,
            "include": ["total"],
        })
    }

    /// Full-text lookup for specific documents.
    pub fn lookup_payload(ids: &[DocumentId]) -> Value {
        json!({
            "query": { "terms": { ID_FIELD: ids } },
            "size": ids.len(),
            "include": LOOKUP_FIELDS,
        })
    }
}

/// Decode one search hit. Hits without a document id are dropped.
pub fn decode_document(hit: &Value) -> Option<PatentDocument> {
    let document_id = hit.get(ID_FIELD)?.as_str()?.to_string();
    let title = hit
        .pointer("/biblio/invention_title/0/text")
        .and_then(Value::as_str)
        .unwrap_or(MISSING_TITLE)
        .to_string();
    let description = hit
        .pointer("/description/text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let claims = hit.get("claims").map(flatten_claims).unwrap_or_default();
    Some(PatentDocument {
        document_id,
        title,
        description,
        claims,
    })
}

/// Reported total from a count response; 0 when absent.
pub fn decode_total(body: &Value) -> u64 {
    body.get("total")
        .or_else(|| body.pointer("/data/total"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Fixed in-memory document set paged by offset.
#[derive(Debug)]
pub struct InMemoryPatentSource {
    id: String,
    documents: Vec<PatentDocument>,
    page_size: usize,
    rejected_ids: Mutex<HashSet<DocumentId>>,
}

impl InMemoryPatentSource {
    /// Serve `documents` in pages of `page_size`.
    pub fn new(documents: Vec<PatentDocument>, page_size: usize) -> Self {
        Self {
            id: "memory".to_string(),
            documents,
            page_size: page_size.max(1),
            rejected_ids: Mutex::new(HashSet::new()),
        }
    }

    /// Make any lookup that includes `id` fail with a client rejection.
    pub fn reject_lookups_for(&self, id: impl Into<DocumentId>) {
        if let Ok(mut rejected) = self.rejected_ids.lock() {
            rejected.insert(id.into());
        }
    }
}

impl PatentSource for InMemoryPatentSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn count_matching(&self, _query: &DepositQuery) -> Result<u64, MinerError> {
        Ok(self.documents.len() as u64)
    }

    fn refresh(
        &self,
        _query: &DepositQuery,
        cursor: Option<&str>,
    ) -> Result<PatentSnapshot, MinerError> {
        let start = match cursor {
            None => 0,
            Some(raw) => raw.parse::<usize>().map_err(|_| MinerError::SourceRejected {
                source_id: self.id.clone(),
                status: 400,
                details: format!("invalid cursor '{raw}'"),
            })?,
        };
        let end = (start + self.page_size).min(self.documents.len());
        let documents = self.documents.get(start..end).unwrap_or_default().to_vec();
        let cursor = (end < self.documents.len()).then(|| end.to_string());
        Ok(PatentSnapshot { documents, cursor })
    }

    fn fetch_by_ids(&self, ids: &[DocumentId]) -> Result<Vec<PatentDocument>, MinerError> {
        if let Ok(rejected) = self.rejected_ids.lock()
            && let Some(id) = ids.iter().find(|id| rejected.contains(*id))
        {
            return Err(MinerError::SourceRejected {
                source_id: self.id.clone(),
                status: 400,
                details: format!("lookup rejected for {id}"),
            });
        }
        let wanted: HashSet<&DocumentId> = ids.iter().collect();
        Ok(self
            .documents
            .iter()
            .filter(|doc| wanted.contains(&doc.document_id))
            .cloned()
            .collect())
    }
}
