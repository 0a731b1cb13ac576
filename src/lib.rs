#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command-line runners behind the `biobroker` binary.
pub mod apps;
/// Embedding collaborator, vector index, and persisted catalog.
pub mod catalog;
/// Tabular checkpoint files shared by every stage.
pub mod checkpoint;
/// Claim-membership classification and claim flattening.
pub mod claims;
/// Stage configuration types.
pub mod config;
/// Centralized constants grouped by concern.
pub mod constants;
/// Patent, deposit, and stage row types.
pub mod data;
/// Accession-identifier extraction.
pub mod extract;
/// Text-generation collaborator and prompts.
pub mod generation;
/// Identifier grammar registry.
pub mod grammar;
/// Stage summaries and reporting helpers.
pub mod metrics;
mod ollama;
/// Stage entry points.
pub mod pipeline;
/// Structured-answer repair, rescue, and generic-term migration.
pub mod reconcile;
/// Capped exponential backoff.
pub mod retry;
/// Context-snippet location.
pub mod snippet;
/// Patent search collaborators and the deposit query.
pub mod source;
/// Shared type aliases.
pub mod types;
/// Text normalization helpers.
pub mod utils;

mod errors;

pub use catalog::{Catalog, CatalogEntry, Embedder, FlatIndex, OllamaEmbedder, SearchHit};
pub use checkpoint::{CheckpointFile, CheckpointRow};
pub use claims::{ClaimsIndex, flatten_claims, is_liberated};
pub use config::{
    CatalogConfig, ContextConfig, EnrichmentConfig, ExtractionConfig, LensConfig, OllamaConfig,
    RefineConfig, SearchConfig,
};
pub use data::{
    BioAnswer, BioAssetRecord, ContextRow, DepositCandidate, EnrichmentStatus, ExtractionRow,
    LiberationStatus, PatentDocument,
};
pub use errors::MinerError;
pub use extract::Extractor;
pub use generation::{OllamaGenerator, TextGenerator};
pub use grammar::{GrammarRegistry, GrammarRule, RuleKind};
pub use metrics::{
    CatalogSummary, ContextSummary, EnrichmentSummary, ExtractionSummary, ReconcileStats,
};
pub use reconcile::{AnswerFailure, Migration, Reconciler};
pub use retry::RetryPolicy;
pub use snippet::{SnippetLocator, locate_context};
pub use source::{DepositQuery, InMemoryPatentSource, LensSource, PatentSnapshot, PatentSource};
pub use types::{
    AccessionId, DocumentId, Embedding, ExtractionKey, RepositoryCode, ResumeKey, SourceId,
};
pub use utils::normalize_compact;
