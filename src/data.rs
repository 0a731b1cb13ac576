use serde::{Deserialize, Serialize};

use crate::constants::claims::{STATUS_MENTIONED, STATUS_OPEN_SOURCE};
use crate::constants::reconcile::UNKNOWN;
pub use crate::types::{AccessionId, DocumentId, ExtractionKey, RepositoryCode, ResumeKey};

/// Patent text as returned by the search collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatentDocument {
    /// Stable document identifier from the search collaborator.
    pub document_id: DocumentId,
    /// Invention title, or "No Title".
    pub title: String,
    /// Description body (may be empty).
    pub description: String,
    /// Claims flattened to a single space-joined string (may be empty).
    pub claims: String,
}

impl PatentDocument {
    /// Description and claims joined by a single space.
    pub fn full_text(&self) -> String {
        format!("{} {}", self.description, self.claims)
    }
}

/// One extracted `(repository, identifier)` pair for a document.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DepositCandidate {
    /// Repository code the identifier was matched under.
    pub repository: RepositoryCode,
    /// Cleaned, upper-cased accession identifier.
    pub accession_id: AccessionId,
    /// Document the identifier was found in.
    pub document_id: DocumentId,
}

/// Claim-membership outcome, persisted as its status label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiberationStatus {
    /// Identifier occurs in the claims.
    #[serde(rename = "OPEN SOURCE")]
    OpenSource,
    /// Identifier occurs only outside the claims.
    #[serde(rename = "Mentioned")]
    Mentioned,
}

impl LiberationStatus {
    /// Map a claim-membership verdict to its status.
    pub fn from_verdict(in_claims: bool) -> Self {
        if in_claims {
            LiberationStatus::OpenSource
        } else {
            LiberationStatus::Mentioned
        }
    }

    /// Persisted label.
    pub fn label(self) -> &'static str {
        match self {
            LiberationStatus::OpenSource => STATUS_OPEN_SOURCE,
            LiberationStatus::Mentioned => STATUS_MENTIONED,
        }
    }
}

impl DepositCandidate {
    /// `(document_id, repository, identifier)`; one extraction row per key.
    pub fn extraction_key(&self) -> ExtractionKey {
        (
            self.document_id.clone(),
            self.repository.clone(),
            self.accession_id.clone(),
        )
    }
}

/// Extraction-stage checkpoint row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRow {
    /// Source document.
    pub document_id: DocumentId,
    /// Document title.
    pub title: String,
    /// Repository code.
    pub repository: RepositoryCode,
    /// Accession identifier.
    pub accession_id: AccessionId,
    /// Claim-membership status label.
    pub liberated_status: LiberationStatus,
    /// Same verdict as `liberated_status`, as a flag.
    pub found_in_claims: bool,
}

impl ExtractionRow {
    /// `(document_id, repository, identifier)`; `None` when any part is blank.
    pub fn extraction_key(&self) -> Option<ExtractionKey> {
        let parts = [&self.document_id, &self.repository, &self.accession_id];
        if parts.iter().any(|part| part.trim().is_empty()) {
            return None;
        }
        Some((
            self.document_id.trim().to_string(),
            self.repository.trim().to_string(),
            self.accession_id.trim().to_string(),
        ))
    }
}

/// Context-stage checkpoint row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRow {
    /// Accession identifier.
    pub accession_id: AccessionId,
    /// Repository code.
    pub repository: RepositoryCode,
    /// Source document.
    pub document_id: DocumentId,
    /// Document title.
    pub title: String,
    /// Context window around the identifier; empty when it could not be located.
    #[serde(default)]
    pub context_snippet: String,
}

/// How an enrichment row came to hold its fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnrichmentStatus {
    /// The generator answered with a parseable object.
    #[serde(rename = "Success")]
    Success,
    /// Snippet missing or too short to describe.
    #[serde(rename = "Skipped (Empty)")]
    SkippedEmpty,
    /// Answer could not be parsed; raw text kept.
    #[serde(rename = "JSON Failed")]
    JsonFailed,
    /// Fields recovered from raw text during refinement.
    #[serde(rename = "Rescued")]
    Rescued,
}

impl EnrichmentStatus {
    /// True for rows whose structured answer could not be parsed.
    pub fn is_failure(self) -> bool {
        matches!(self, EnrichmentStatus::JsonFailed)
    }

    /// Persisted label.
    pub fn label(self) -> &'static str {
        match self {
            EnrichmentStatus::Success => "Success",
            EnrichmentStatus::SkippedEmpty => "Skipped (Empty)",
            EnrichmentStatus::JsonFailed => "JSON Failed",
            EnrichmentStatus::Rescued => "Rescued",
        }
    }
}

/// Reconciled, enriched unit: enrichment and refine stage row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BioAssetRecord {
    /// Accession identifier.
    pub accession_id: AccessionId,
    /// Repository code.
    pub repository: RepositoryCode,
    /// Source document.
    pub document_id: DocumentId,
    /// Document title.
    pub title: String,
    /// Scientific name; never a generic category word after reconciliation.
    pub name: String,
    /// Strain designation.
    pub strain: String,
    /// Organism class, e.g. "Bacteria" or "Human Cell Line".
    pub category: String,
    /// Short industrial use.
    pub application: String,
    /// How the fields were obtained.
    pub status: EnrichmentStatus,
    /// Raw generator output kept on the failure path only.
    #[serde(default)]
    pub raw_response: String,
}

impl BioAssetRecord {
    /// Start a record for a context row with every field unknown.
    pub fn unknown_for(row: &ContextRow, status: EnrichmentStatus) -> Self {
        Self {
            accession_id: row.accession_id.clone(),
            repository: row.repository.clone(),
            document_id: row.document_id.clone(),
            title: row.title.clone(),
            name: UNKNOWN.to_string(),
            strain: UNKNOWN.to_string(),
            category: UNKNOWN.to_string(),
            application: UNKNOWN.to_string(),
            status,
            raw_response: String::new(),
        }
    }

    /// Copy the answer fields onto this record.
    pub fn apply_answer(&mut self, answer: BioAnswer) {
        self.name = answer.name;
        self.strain = answer.strain;
        self.category = answer.category;
        self.application = answer.application;
    }

    /// True when the record names a concrete organism.
    pub fn has_known_name(&self) -> bool {
        let name = self.name.trim();
        !name.is_empty() && name != UNKNOWN
    }
}

/// Fields recovered from a structured answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BioAnswer {
    /// Scientific name.
    pub name: String,
    /// Strain designation.
    pub strain: String,
    /// Organism class.
    pub category: String,
    /// Short industrial use.
    pub application: String,
}

impl Default for BioAnswer {
    fn default() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            strain: UNKNOWN.to_string(),
            category: UNKNOWN.to_string(),
            application: UNKNOWN.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_text_joins_description_and_claims() {
        let doc = PatentDocument {
            document_id: "d1".into(),
            title: "t".into(),
            description: "desc".into(),
            claims: "claim".into(),
        };
        assert_eq!(doc.full_text(), "desc claim");
    }

    #[test]
    fn status_labels_round_trip_through_serde() {
        let json = serde_json::to_string(&LiberationStatus::OpenSource).unwrap();
        assert_eq!(json, "\"OPEN SOURCE\"");
        let status: EnrichmentStatus = serde_json::from_str("\"Skipped (Empty)\"").unwrap();
        assert_eq!(status, EnrichmentStatus::SkippedEmpty);
        assert_eq!(LiberationStatus::from_verdict(false).label(), "Mentioned");
    }
}
