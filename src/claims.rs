//! Claim-membership classification and claim payload flattening.
//!
//! Membership is substring containment over `normalize_compact` forms. A short
//! identifier whose normalized form sits inside a longer unrelated token in the
//! claims still counts as a member; callers treat the verdict as advisory.

use serde_json::Value;

use crate::constants::claims::{CLAIM_TEXT_KEYS, NESTED_CLAIMS_KEY};
use crate::data::{DepositCandidate, ExtractionRow, LiberationStatus};
use crate::utils::normalize_compact;

/// True when the normalized identifier occurs in the normalized claims text.
///
/// Empty claims (or an identifier that normalizes to nothing) are never members.
pub fn is_liberated(claims_text: &str, identifier: &str) -> bool {
    if claims_text.is_empty() {
        return false;
    }
    let needle = normalize_compact(identifier);
    if needle.is_empty() {
        return false;
    }
    normalize_compact(claims_text).contains(&needle)
}

/// Claims text for many identifiers of one document, normalized once.
#[derive(Clone, Debug)]
pub struct ClaimsIndex {
    normalized: String,
}

impl ClaimsIndex {
    /// Normalize `claims_text` for repeated membership checks.
    pub fn new(claims_text: &str) -> Self {
        Self {
            normalized: normalize_compact(claims_text),
        }
    }

    /// Same verdict as `is_liberated` against the indexed claims.
    pub fn contains(&self, identifier: &str) -> bool {
        let needle = normalize_compact(identifier);
        !self.normalized.is_empty() && !needle.is_empty() && self.normalized.contains(&needle)
    }

    /// Build the extraction row for `candidate`.
    pub fn classify(&self, candidate: DepositCandidate, title: &str) -> ExtractionRow {
        let found_in_claims = self.contains(&candidate.accession_id);
        ExtractionRow {
            document_id: candidate.document_id,
            title: title.to_string(),
            repository: candidate.repository,
            accession_id: candidate.accession_id,
            liberated_status: LiberationStatus::from_verdict(found_in_claims),
            found_in_claims,
        }
    }
}

/// Flatten an arbitrarily nested claims payload into one space-joined string.
///
/// Strings are taken verbatim, arrays are walked in order, and objects
/// contribute their `claim_text`, `text`, `claim`, then nested `claims` values.
pub fn flatten_claims(payload: &Value) -> String {
    let mut parts = Vec::new();
    collect_claim_parts(payload, &mut parts);
    parts.join(" ")
}

fn collect_claim_parts<'v>(value: &'v Value, parts: &mut Vec<&'v str>) {
    match value {
        Value::String(text) => parts.push(text),
        Value::Array(items) => {
            for item in items {
                collect_claim_parts(item, parts);
            }
        }
        Value::Object(map) => {
            for key in CLAIM_TEXT_KEYS {
                if let Some(inner) = map.get(*key)
                    && is_truthy(inner)
                {
                    collect_claim_parts(inner, parts);
                }
            }
            if let Some(nested) = map.get(NESTED_CLAIMS_KEY) {
                collect_claim_parts(nested, parts);
            }
        }
        _ => {}
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_claims_are_never_members() {
        assert!(!is_liberated("", "PTA-12345"));
        assert!(!ClaimsIndex::new("").contains("PTA-12345"));
    }

    #[test]
    fn membership_ignores_spacing_and_hyphenation() {
        let claims = "1. A strain deposited under ATCC Accession No. PTA - 12 345.";
        assert!(is_liberated(claims, "PTA-12345"));
        assert!(is_liberated(claims, "pta12345"));
        assert!(!is_liberated(claims, "PTA-12346"));
    }

    #[test]
    fn short_identifiers_match_inside_longer_numbers() {
        assert!(is_liberated("SEQ ID NO 9912345", "12345"));
    }

    #[test]
    fn classify_sets_status_from_verdict() {
        let index = ClaimsIndex::new("claim one: DSM 1234");
        let candidate = DepositCandidate {
            repository: "DSMZ".into(),
            accession_id: "DSM 1234".into(),
            document_id: "d".into(),
        };
        let row = index.classify(candidate, "Title");
        assert!(row.found_in_claims);
        assert_eq!(row.liberated_status, LiberationStatus::OpenSource);
    }

    #[test]
    fn flatten_claims_walks_nested_payloads() {
        let payload = json!([
            {"claims": [{"claim_text": ["first claim", "continued"]}, {"claim_text": "second"}]},
            {"text": "third", "claim": null},
            "fourth",
            42
        ]);
        assert_eq!(
            flatten_claims(&payload),
            "first claim continued second third fourth"
        );
        assert_eq!(flatten_claims(&Value::Null), "");
    }
}
