//! Accession-identifier extraction over full patent text.

use std::collections::BTreeSet;

use crate::constants::grammar::MIN_IDENTIFIER_LEN;
use crate::data::{DepositCandidate, PatentDocument};
use crate::errors::MinerError;
use crate::grammar::GrammarRegistry;
use crate::types::{AccessionId, RepositoryCode};

/// Applies a `GrammarRegistry` to text and yields deduplicated candidates.
#[derive(Clone, Debug)]
pub struct Extractor {
    registry: GrammarRegistry,
}

impl Extractor {
    /// Extractor over the built-in registry.
    pub fn builtin() -> Result<Self, MinerError> {
        Ok(Self::new(GrammarRegistry::builtin()?))
    }

    /// Extractor over a caller-supplied registry.
    pub fn new(registry: GrammarRegistry) -> Self {
        Self { registry }
    }

    /// Registry used by this extractor.
    pub fn registry(&self) -> &GrammarRegistry {
        &self.registry
    }

    /// Unique `(repository, identifier)` pairs found in `text`.
    ///
    /// Empty text yields an empty set. Ordering of the set is lexicographic,
    /// independent of rule order.
    pub fn extract(&self, text: &str) -> BTreeSet<(RepositoryCode, AccessionId)> {
        let mut found = BTreeSet::new();
        if text.is_empty() {
            return found;
        }
        for (code, rules) in self.registry.iter() {
            for rule in rules {
                for raw in rule.raw_matches(text) {
                    if let Some(identifier) = clean_identifier(raw) {
                        found.insert((code.to_string(), identifier));
                    }
                }
            }
        }
        found
    }

    /// Candidates for a whole document (description followed by claims).
    pub fn extract_document(&self, doc: &PatentDocument) -> Vec<DepositCandidate> {
        self.extract(&doc.full_text())
            .into_iter()
            .map(|(repository, accession_id)| DepositCandidate {
                repository,
                accession_id,
                document_id: doc.document_id.clone(),
            })
            .collect()
    }
}

/// Trim trailing periods and whitespace, upper-case, and apply the
/// false-positive filter (more than two characters, at least one digit).
pub fn clean_identifier(raw: &str) -> Option<AccessionId> {
    let cleaned = raw.trim_end_matches('.').trim().to_uppercase();
    let long_enough = cleaned.chars().count() > MIN_IDENTIFIER_LEN;
    let has_digit = cleaned.chars().any(|ch| ch.is_ascii_digit());
    (long_enough && has_digit).then_some(cleaned)
}
