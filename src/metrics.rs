use std::collections::HashMap;

use serde::Serialize;

use crate::reconcile::Migration;
use crate::types::RepositoryCode;

/// Counters reported by the refine pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Records processed.
    pub total: usize,
    /// Failed records recovered from raw text.
    pub rescued: usize,
    /// "Human" names moved to Human Cell Line.
    pub human: usize,
    /// Hybridoma names moved to Hybridoma.
    pub hybridoma: usize,
    /// Plasmid or vector names moved to Plasmid/Vector.
    pub plasmid_vector: usize,
    /// Organism-class names cleared.
    pub generic_class: usize,
}

impl ReconcileStats {
    /// Count one applied migration.
    pub fn record_migration(&mut self, migration: Migration) {
        match migration {
            Migration::Human => self.human += 1,
            Migration::Hybridoma => self.hybridoma += 1,
            Migration::PlasmidVector => self.plasmid_vector += 1,
            Migration::GenericClass => self.generic_class += 1,
        }
    }

    /// Total migrations across all kinds.
    pub fn migrated(&self) -> usize {
        self.human + self.hybridoma + self.plasmid_vector + self.generic_class
    }
}

/// Totals for one extraction run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExtractionSummary {
    /// Documents returned by the source.
    pub documents_scanned: usize,
    /// Rows appended this run.
    pub deposits_written: usize,
    /// Appended rows whose identifier occurs in the claims.
    pub liberated: usize,
    /// Candidates already present in the checkpoint.
    pub skipped_resumed: usize,
    /// Result pages processed.
    pub pages: usize,
    /// Appended rows per repository code.
    pub per_repository: HashMap<RepositoryCode, usize>,
}

/// Totals for one context run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ContextSummary {
    /// Liberated deposits without a snippet at start.
    pub pending: usize,
    /// Rows appended this run.
    pub snippets_written: usize,
    /// Rows whose identifier could not be located.
    pub empty_snippets: usize,
    /// Lookup batches that failed and were skipped.
    pub failed_batches: usize,
}

/// Totals for one enrichment run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentSummary {
    /// Context rows without an enrichment row at start.
    pub pending: usize,
    /// Rows appended this run.
    pub written: usize,
    /// Rows with a parsed answer.
    pub success: usize,
    /// Rows skipped for a missing or short snippet.
    pub skipped_empty: usize,
    /// Rows whose answer could not be parsed.
    pub json_failed: usize,
}

/// Totals for one catalog build.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    /// Records with a known name.
    pub eligible: usize,
    /// Records added to the catalog.
    pub embedded: usize,
    /// Embedding batches that failed and were skipped.
    pub failed_batches: usize,
}

/// Share of deposit events attributed to each repository.
#[derive(Clone, Debug, PartialEq)]
pub struct RepositoryShare {
    /// Repository code.
    pub repository: RepositoryCode,
    /// Deposit count.
    pub count: usize,
    /// Fraction of all deposits, 0.0 to 1.0.
    pub share: f64,
}

/// Per-repository shares sorted by count (descending), then code.
pub fn repository_shares(counts: &HashMap<RepositoryCode, usize>) -> Vec<RepositoryShare> {
    let total: usize = counts.values().sum();
    let mut shares: Vec<RepositoryShare> = counts
        .iter()
        .map(|(repository, count)| RepositoryShare {
            repository: repository.clone(),
            count: *count,
            share: if total == 0 {
                0.0
            } else {
                *count as f64 / total as f64
            },
        })
        .collect();
    shares.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.repository.cmp(&b.repository))
    });
    shares
}
