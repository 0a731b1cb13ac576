//! Embedding collaborator, flat vector index, and the persisted asset catalog.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::{OllamaConfig, SearchConfig};
use crate::constants::catalog::{ATCC_ORDER_PREFIX, CATALOG_VERSION, DSMZ_ORDER_PREFIX};
use crate::data::BioAssetRecord;
use crate::errors::MinerError;
use crate::ollama::OllamaHttp;
use crate::types::{AccessionId, Embedding, RepositoryCode};
use crate::utils::truncate_chars;

/// Maps strings to fixed-dimension vectors.
pub trait Embedder {
    /// One vector per input, in input order.
    fn embed(&mut self, texts: &[String]) -> Result<Vec<Embedding>, MinerError>;
}

/// Embedder backed by Ollama's batched `/api/embed`.
pub struct OllamaEmbedder {
    http: OllamaHttp,
    model: String,
    max_chars: usize,
}

impl OllamaEmbedder {
    /// Connect using the endpoint and embedding model from `config`.
    pub fn new(config: &OllamaConfig) -> Self {
        Self {
            http: OllamaHttp::new(&config.endpoint, config.timeout_secs),
            model: config.embedding_model.clone(),
            max_chars: config.embed_max_chars,
        }
    }

    fn payload(&self, texts: &[String]) -> Value {
        let clamped: Vec<String> = texts
            .iter()
            .map(|text| truncate_chars(text, self.max_chars))
            .collect();
        json!({ "model": self.model, "input": clamped })
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&mut self, texts: &[String]) -> Result<Vec<Embedding>, MinerError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let reply = self
            .http
            .post("/api/embed", &self.payload(texts))
            .map_err(MinerError::Embedding)?;
        let vectors = parse_embeddings(&reply)?;
        if vectors.len() != texts.len() {
            return Err(MinerError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

fn parse_embeddings(reply: &Value) -> Result<Vec<Embedding>, MinerError> {
    let rows = reply
        .get("embeddings")
        .and_then(Value::as_array)
        .ok_or_else(|| MinerError::Embedding("reply is missing 'embeddings'".to_string()))?;
    rows.iter()
        .map(|row| {
            row.as_array()
                .ok_or_else(|| MinerError::Embedding("expected array of arrays".to_string()))?
                .iter()
                .map(|v| {
                    v.as_f64()
                        .map(|f| f as f32)
                        .ok_or_else(|| MinerError::Embedding("expected float".to_string()))
                })
                .collect()
        })
        .collect()
}

/// Exhaustive nearest-neighbor index over squared Euclidean distance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<Embedding>,
}

impl FlatIndex {
    /// Empty index; the dimension is fixed by the first vector added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Vector dimension (0 before the first add).
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// True when no vector is stored.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Append `vector`; its position is its id.
    pub fn add(&mut self, vector: Embedding) -> Result<usize, MinerError> {
        if self.vectors.is_empty() && self.dimension == 0 {
            self.dimension = vector.len();
        }
        if vector.len() != self.dimension || vector.is_empty() {
            return Err(MinerError::Embedding(format!(
                "vector dimension {} does not match index dimension {}",
                vector.len(),
                self.dimension
            )));
        }
        self.vectors.push(vector);
        Ok(self.vectors.len() - 1)
    }

    /// Up to `k` `(id, distance)` pairs, nearest first; ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, MinerError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(MinerError::Embedding(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            )));
        }
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(id, vector)| (id, squared_l2(query, vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Searchable metadata stored beside each vector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Accession identifier.
    pub accession_id: AccessionId,
    /// Repository code.
    pub repository: RepositoryCode,
    /// Scientific name.
    pub name: String,
    /// Organism class.
    pub category: String,
    /// Short industrial use.
    pub application: String,
    /// Title of the source patent.
    pub title: String,
}

impl From<&BioAssetRecord> for CatalogEntry {
    fn from(record: &BioAssetRecord) -> Self {
        Self {
            accession_id: record.accession_id.clone(),
            repository: record.repository.clone(),
            name: record.name.clone(),
            category: record.category.clone(),
            application: record.application.clone(),
            title: record.title.clone(),
        }
    }
}

/// Text embedded for one record.
pub fn rich_document(record: &BioAssetRecord, snippet: &str) -> String {
    format!(
        "Organism: {}. Category: {}. Application: {}. Title: {}. Context: {}",
        record.name, record.category, record.application, record.title, snippet
    )
}

/// Repository order page for ATCC and DSMZ deposits.
pub fn order_link(repository: &str, accession_id: &str) -> Option<String> {
    match repository {
        "ATCC" => Some(format!("{ATCC_ORDER_PREFIX}{accession_id}")),
        "DSMZ" => Some(format!("{DSMZ_ORDER_PREFIX}{accession_id}")),
        _ => None,
    }
}

/// Rough similarity percentage from an L2 distance, one decimal place.
pub fn similarity_score(distance: f32) -> f64 {
    ((1.0 - f64::from(distance)) * 1000.0).round() / 10.0
}

/// One search result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchHit {
    /// Rough similarity percentage.
    pub score: f64,
    /// Matched asset.
    pub entry: CatalogEntry,
    /// Order page for ATCC and DSMZ deposits.
    pub order_link: Option<String>,
}

/// Catalog summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    /// Number of assets.
    pub assets: usize,
    /// Distinct categories, sorted.
    pub categories: Vec<String>,
}

/// Vectors plus metadata, persisted as one JSON document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    version: u8,
    built_at: DateTime<Utc>,
    index: FlatIndex,
    entries: Vec<CatalogEntry>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self {
            version: CATALOG_VERSION,
            built_at: Utc::now(),
            index: FlatIndex::new(),
            entries: Vec::new(),
        }
    }

    /// Store `vector` for `entry`.
    pub fn insert(&mut self, entry: CatalogEntry, vector: Embedding) -> Result<(), MinerError> {
        self.index.add(vector)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the catalog holds no assets.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// When the catalog was created.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Asset count and sorted distinct categories.
    pub fn stats(&self) -> CatalogStats {
        let categories: BTreeSet<&str> = self.entries.iter().map(|e| e.category.as_str()).collect();
        CatalogStats {
            assets: self.entries.len(),
            categories: categories.into_iter().map(str::to_string).collect(),
        }
    }

    /// Nearest assets to `vector`, filtered to `categories` when non-empty.
    pub fn search_vector(
        &self,
        vector: &[f32],
        categories: &[String],
        config: &SearchConfig,
    ) -> Result<Vec<SearchHit>, MinerError> {
        let mut hits = Vec::new();
        for (id, distance) in self.index.search(vector, config.candidates)? {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            if !categories.is_empty() && !categories.iter().any(|c| *c == entry.category) {
                continue;
            }
            hits.push(SearchHit {
                score: similarity_score(distance),
                order_link: order_link(&entry.repository, &entry.accession_id),
                entry: entry.clone(),
            });
            if hits.len() >= config.max_results {
                break;
            }
        }
        Ok(hits)
    }

    /// Embed `query` and search.
    pub fn search(
        &self,
        embedder: &mut dyn Embedder,
        query: &str,
        categories: &[String],
        config: &SearchConfig,
    ) -> Result<Vec<SearchHit>, MinerError> {
        let mut vectors = embedder.embed(&[query.to_string()])?;
        let vector = vectors
            .pop()
            .ok_or_else(|| MinerError::Embedding("no vector returned for query".to_string()))?;
        let hits = self.search_vector(&vector, categories, config)?;
        debug!("[biobroker:catalog] '{query}' matched {} assets", hits.len());
        Ok(hits)
    }

    /// Write the catalog to `path` via a sibling `.part` file.
    pub fn save(&self, path: &Path) -> Result<(), MinerError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let temp = path.with_extension("part");
        fs::write(&temp, serde_json::to_vec(self)?)?;
        fs::rename(&temp, path)?;
        info!(
            "[biobroker:catalog] saved {} assets (dim={}) to {}",
            self.len(),
            self.dimension(),
            path.display()
        );
        Ok(())
    }

    /// Load a catalog written by `save`.
    pub fn load(path: &Path) -> Result<Self, MinerError> {
        if !path.exists() {
            return Err(MinerError::MissingInput(path.to_path_buf()));
        }
        let catalog: Catalog = serde_json::from_slice(&fs::read(path)?)?;
        if catalog.version != CATALOG_VERSION {
            return Err(MinerError::Configuration(format!(
                "unsupported catalog version {} in {}",
                catalog.version,
                path.display()
            )));
        }
        if catalog.index.len() != catalog.entries.len() {
            return Err(MinerError::Checkpoint(format!(
                "catalog {} has {} vectors for {} entries",
                path.display(),
                catalog.index.len(),
                catalog.entries.len()
            )));
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ContextRow, EnrichmentStatus};
    use tempfile::tempdir;

    fn entry(id: &str, repository: &str, category: &str) -> CatalogEntry {
        CatalogEntry {
            accession_id: id.into(),
            repository: repository.into(),
            name: format!("organism {id}"),
            category: category.into(),
            application: "Unknown".into(),
            title: "t".into(),
        }
    }

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .insert(entry("PTA-1", "ATCC", "Bacteria"), vec![0.0, 0.0])
            .unwrap();
        catalog
            .insert(entry("5000", "DSMZ", "Fungi"), vec![0.1, 0.0])
            .unwrap();
        catalog
            .insert(entry("77", "CBS", "Bacteria"), vec![1.0, 1.0])
            .unwrap();
        catalog
    }

    #[test]
    fn flat_index_orders_by_distance_then_insertion() {
        let mut index = FlatIndex::new();
        index.add(vec![1.0, 0.0]).unwrap();
        index.add(vec![0.0, 1.0]).unwrap();
        index.add(vec![0.0, 0.0]).unwrap();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(hits[0], (2, 0.0));
        assert_eq!(hits[1].0, 0);
        assert_eq!(hits[2].0, 1);
        assert!(index.add(vec![1.0]).is_err());
        assert!(index.search(&[1.0, 2.0, 3.0], 1).is_err());
    }

    #[test]
    fn search_filters_categories_and_caps_results() {
        let catalog = sample_catalog();
        let config = SearchConfig {
            candidates: 50,
            max_results: 1,
        };
        let hits = catalog.search_vector(&[0.0, 0.0], &[], &config).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 100.0);
        assert_eq!(
            hits[0].order_link.as_deref(),
            Some("https://www.atcc.org/products/PTA-1")
        );

        let fungi = catalog
            .search_vector(&[0.0, 0.0], &["Fungi".to_string()], &SearchConfig::default())
            .unwrap();
        assert_eq!(fungi.len(), 1);
        assert_eq!(fungi[0].entry.repository, "DSMZ");
        assert_eq!(fungi[0].score, 99.0);
        assert_eq!(
            fungi[0].order_link.as_deref(),
            Some("https://www.dsmz.de/collection/catalogue/details/culture/DSM-5000")
        );
    }

    #[test]
    fn scores_can_go_negative_for_distant_vectors() {
        assert_eq!(similarity_score(0.0), 100.0);
        assert_eq!(similarity_score(2.0), -100.0);
        assert_eq!(similarity_score(0.25), 75.0);
    }

    #[test]
    fn order_links_exist_only_for_known_repositories() {
        assert!(order_link("CBS", "280.96").is_none());
    }

    #[test]
    fn stats_report_distinct_sorted_categories() {
        let stats = sample_catalog().stats();
        assert_eq!(stats.assets, 3);
        assert_eq!(stats.categories, vec!["Bacteria", "Fungi"]);
    }

    #[test]
    fn save_and_load_preserve_the_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let catalog = sample_catalog();
        catalog.save(&path).unwrap();
        let loaded = Catalog::load(&path).unwrap();
        assert_eq!(loaded, catalog);
        assert!(matches!(
            Catalog::load(&dir.path().join("absent.json")),
            Err(MinerError::MissingInput(_))
        ));
    }

    #[test]
    fn rich_document_lists_fields_in_order() {
        let row = ContextRow {
            accession_id: "PTA-1".into(),
            repository: "ATCC".into(),
            document_id: "d".into(),
            title: "Oil degradation".into(),
            context_snippet: String::new(),
        };
        let mut record = BioAssetRecord::unknown_for(&row, EnrichmentStatus::Success);
        record.name = "Pseudomonas putida".into();
        record.category = "Bacteria".into();
        record.application = "Bioremediation".into();
        assert_eq!(
            rich_document(&record, "degrades crude oil"),
            "Organism: Pseudomonas putida. Category: Bacteria. Application: Bioremediation. \
             Title: Oil degradation. Context: degrades crude oil"
        );
    }

    #[test]
    fn embed_reply_parsing_rejects_bad_shapes() {
        let ok = parse_embeddings(&json!({ "embeddings": [[0.5, 1.0]] })).unwrap();
        assert_eq!(ok, vec![vec![0.5, 1.0]]);
        assert!(parse_embeddings(&json!({ "data": [] })).is_err());
        assert!(parse_embeddings(&json!({ "embeddings": [["x"]] })).is_err());
    }

    #[test]
    fn embed_payload_clamps_inputs() {
        let config = OllamaConfig {
            embed_max_chars: 4,
            ..OllamaConfig::default()
        };
        let embedder = OllamaEmbedder::new(&config);
        let payload = embedder.payload(&["abcdefgh".to_string()]);
        assert_eq!(payload["input"][0], "abcd");
        assert_eq!(payload["model"], "all-minilm");
    }
}
