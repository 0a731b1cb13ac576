use std::path::PathBuf;

use crate::constants::{catalog, enrichment, lens};
use crate::retry::RetryPolicy;

/// Default extraction-stage output file.
pub const DEFAULT_DEPOSITS_FILE: &str = "deposits.csv";
/// Default context-stage output file.
pub const DEFAULT_CONTEXTS_FILE: &str = "contexts.csv";
/// Default enrichment-stage output file.
pub const DEFAULT_ENRICHED_FILE: &str = "enriched.csv";
/// Default refine-stage output file.
pub const DEFAULT_REFINED_FILE: &str = "refined.csv";

/// Connection settings for the patent search service.
#[derive(Clone, Debug)]
pub struct LensConfig {
    /// Search endpoint URL.
    pub endpoint: String,
    /// Bearer token sent with every request.
    pub api_key: String,
    /// Documents requested per scan page.
    pub page_size: usize,
    /// Lifetime of the server-side scroll context between pages.
    pub scroll_ttl: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Backoff applied to rate limiting, 5xx, and transport failures.
    pub retry: RetryPolicy,
    /// Largest response body accepted, in bytes.
    pub max_body_bytes: u64,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            endpoint: lens::DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            page_size: 100,
            scroll_ttl: lens::DEFAULT_SCROLL_TTL.to_string(),
            timeout_secs: 60,
            retry: RetryPolicy::default(),
            max_body_bytes: lens::DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Stage 1: scan, extract, classify.
#[derive(Clone, Debug)]
pub struct ExtractionConfig {
    /// Checkpoint file receiving extraction rows.
    pub output: PathBuf,
    /// Stop after this many pages (`None` scans until exhausted).
    pub max_pages: Option<usize>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_DEPOSITS_FILE),
            max_pages: None,
        }
    }
}

/// Stage 2: context snippets for liberated deposits.
#[derive(Clone, Debug)]
pub struct ContextConfig {
    /// Extraction checkpoint to read.
    pub input: PathBuf,
    /// Checkpoint file receiving context rows.
    pub output: PathBuf,
    /// Unique documents fetched per lookup request.
    pub batch_size: usize,
    /// Characters kept on each side of the identifier.
    pub window: usize,
    /// Pause between lookup batches.
    pub pause_ms: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_DEPOSITS_FILE),
            output: PathBuf::from(DEFAULT_CONTEXTS_FILE),
            batch_size: 50,
            window: 1000,
            pause_ms: 500,
        }
    }
}

/// Stage 3: structured answers from the text generator.
#[derive(Clone, Debug)]
pub struct EnrichmentConfig {
    /// Context checkpoint to read.
    pub input: PathBuf,
    /// Checkpoint file receiving enrichment rows.
    pub output: PathBuf,
    /// Rows buffered before each append.
    pub flush_every: usize,
    /// Snippets shorter than this are recorded as skipped.
    pub min_snippet_chars: usize,
    /// Snippet characters included in the prompt.
    pub prompt_snippet_chars: usize,
    /// Raw generator characters kept on the failure path.
    pub raw_fallback_chars: usize,
    /// Send a readiness prompt before the first row.
    pub probe_generator: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_CONTEXTS_FILE),
            output: PathBuf::from(DEFAULT_ENRICHED_FILE),
            flush_every: 10,
            min_snippet_chars: 20,
            prompt_snippet_chars: 2500,
            raw_fallback_chars: 500,
            probe_generator: true,
        }
    }
}

/// Stage 4: rescue and generic-term cleanup.
#[derive(Clone, Debug)]
pub struct RefineConfig {
    /// Enrichment checkpoint to read.
    pub input: PathBuf,
    /// File overwritten with the refined rows.
    pub output: PathBuf,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_ENRICHED_FILE),
            output: PathBuf::from(DEFAULT_REFINED_FILE),
        }
    }
}

/// Stage 5: embed refined records into a persisted catalog.
#[derive(Clone, Debug)]
pub struct CatalogConfig {
    /// Refined records to index.
    pub input: PathBuf,
    /// Optional context checkpoint joined in for richer documents.
    pub contexts: Option<PathBuf>,
    /// Catalog file written on completion.
    pub output: PathBuf,
    /// Documents embedded per request.
    pub embed_batch_size: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_REFINED_FILE),
            contexts: Some(PathBuf::from(DEFAULT_CONTEXTS_FILE)),
            output: PathBuf::from(catalog::DEFAULT_CATALOG_FILE),
            embed_batch_size: 100,
        }
    }
}

/// Catalog query limits.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Nearest neighbors pulled before category filtering.
    pub candidates: usize,
    /// Results returned after filtering.
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            candidates: 50,
            max_results: 10,
        }
    }
}

/// Connection settings for the local generation and embedding server.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Server base URL.
    pub endpoint: String,
    /// Model answering enrichment prompts.
    pub generation_model: String,
    /// Model producing catalog embeddings.
    pub embedding_model: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Embedding inputs are clamped to this many characters.
    pub embed_max_chars: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: enrichment::DEFAULT_ENDPOINT.to_string(),
            generation_model: enrichment::DEFAULT_MODEL.to_string(),
            embedding_model: catalog::DEFAULT_EMBED_MODEL.to_string(),
            timeout_secs: 300,
            embed_max_chars: catalog::EMBED_MAX_CHARS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_defaults_chain_outputs_into_inputs() {
        let context = ContextConfig::default();
        let enrichment = EnrichmentConfig::default();
        let refine = RefineConfig::default();
        let catalog = CatalogConfig::default();
        assert_eq!(context.input, ExtractionConfig::default().output);
        assert_eq!(enrichment.input, context.output);
        assert_eq!(refine.input, enrichment.output);
        assert_eq!(catalog.input, refine.output);
    }

    #[test]
    fn defaults_match_documented_tunables() {
        let context = ContextConfig::default();
        assert_eq!((context.window, context.batch_size), (1000, 50));
        let enrichment = EnrichmentConfig::default();
        assert_eq!(enrichment.flush_every, 10);
        assert_eq!(enrichment.min_snippet_chars, 20);
        assert_eq!(enrichment.prompt_snippet_chars, 2500);
        assert_eq!(enrichment.raw_fallback_chars, 500);
        let search = SearchConfig::default();
        assert_eq!((search.candidates, search.max_results), (50, 10));
        assert_eq!(LensConfig::default().page_size, 100);
        assert!(LensConfig::default().max_body_bytes > 10 * 1024 * 1024);
    }
}
