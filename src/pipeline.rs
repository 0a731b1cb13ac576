//! Stage entry points.
//!
//! Each stage reads its predecessor's checkpoint, skips keys it already
//! finished, and appends its own rows batch by batch. Per-record failures
//! become degraded rows; only missing inputs and checkpoint I/O stop a stage.

use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogEntry, Embedder, rich_document};
use crate::checkpoint::{CheckpointFile, overwrite_rows, read_required, read_rows};
use crate::claims::ClaimsIndex;
use crate::config::{CatalogConfig, ContextConfig, EnrichmentConfig, ExtractionConfig, RefineConfig};
use crate::constants::reconcile::{PARSE_ERROR, SEE_RAW};
use crate::data::{BioAssetRecord, ContextRow, EnrichmentStatus, ExtractionRow, LiberationStatus};
use crate::errors::MinerError;
use crate::extract::Extractor;
use crate::generation::{TextGenerator, enrichment_prompt, repair_prompt};
use crate::metrics::{
    CatalogSummary, ContextSummary, EnrichmentSummary, ExtractionSummary, ReconcileStats,
    repository_shares,
};
use crate::reconcile::{AnswerFailure, Reconciler};
use crate::snippet::SnippetLocator;
use crate::source::{DepositQuery, PatentSource};
use crate::types::{DocumentId, ResumeKey};
use crate::utils::truncate_chars;

/// Total number of patents the deposit query matches.
pub fn run_count(source: &dyn PatentSource, extractor: &Extractor) -> Result<u64, MinerError> {
    let query = DepositQuery::for_registry(extractor.registry());
    info!(
        "[biobroker:count] querying {} with {} deposit keywords",
        source.id(),
        query.keywords().len()
    );
    source.count_matching(&query)
}

/// Stage 1: scan matching patents, extract deposits, classify claim membership.
///
/// A page failure after the first page ends the scan; rows already appended
/// stay valid and a rerun resumes from them.
pub fn run_extraction(
    source: &dyn PatentSource,
    extractor: &Extractor,
    config: &ExtractionConfig,
) -> Result<ExtractionSummary, MinerError> {
    let query = DepositQuery::for_registry(extractor.registry());
    let checkpoint = CheckpointFile::<ExtractionRow>::open(&config.output)?;
    let mut finished = checkpoint.keys_by(ExtractionRow::extraction_key);
    let mut summary = ExtractionSummary::default();
    let mut cursor: Option<String> = None;

    loop {
        if let Some(max_pages) = config.max_pages
            && summary.pages >= max_pages
        {
            info!("[biobroker:extract] page limit {max_pages} reached");
            break;
        }
        let snapshot = match source.refresh(&query, cursor.as_deref()) {
            Ok(snapshot) => snapshot,
            Err(err) if summary.pages == 0 => return Err(err),
            Err(err) => {
                warn!(
                    "[biobroker:extract] scan stopped after {} pages: {err}",
                    summary.pages
                );
                break;
            }
        };
        if snapshot.documents.is_empty() {
            break;
        }
        summary.pages += 1;

        let mut rows = Vec::new();
        for doc in &snapshot.documents {
            summary.documents_scanned += 1;
            let candidates = extractor.extract_document(doc);
            if candidates.is_empty() {
                continue;
            }
            let claims = ClaimsIndex::new(&doc.claims);
            for candidate in candidates {
                let key = candidate.extraction_key();
                if finished.contains(&key) {
                    summary.skipped_resumed += 1;
                    continue;
                }
                let row = claims.classify(candidate, &doc.title);
                if row.liberated_status == LiberationStatus::OpenSource {
                    summary.liberated += 1;
                }
                *summary
                    .per_repository
                    .entry(row.repository.clone())
                    .or_default() += 1;
                finished.insert(key);
                rows.push(row);
            }
        }
        checkpoint.append(&rows)?;
        summary.deposits_written += rows.len();
        info!(
            "[biobroker:extract] page {} done: {} documents scanned, {} deposits written",
            summary.pages, summary.documents_scanned, summary.deposits_written
        );

        cursor = snapshot.cursor;
        if cursor.is_none() {
            break;
        }
    }

    for share in repository_shares(&summary.per_repository) {
        debug!(
            "[biobroker:extract] {}: {} deposits ({:.1}%)",
            share.repository,
            share.count,
            share.share * 100.0
        );
    }
    info!(
        "[biobroker:extract] complete: {} deposit events, {} liberated, {} already present",
        summary.deposits_written, summary.liberated, summary.skipped_resumed
    );
    Ok(summary)
}

/// Stage 2: context snippets for liberated deposits.
pub fn run_context(
    source: &dyn PatentSource,
    config: &ContextConfig,
) -> Result<ContextSummary, MinerError> {
    let rows = read_required::<ExtractionRow>(&config.input)?;
    let checkpoint = CheckpointFile::<ContextRow>::open(&config.output)?;
    let finished = checkpoint.resume_keys();
    let locator = SnippetLocator::new(config.window);

    let mut by_document: IndexMap<DocumentId, Vec<ExtractionRow>> = IndexMap::new();
    let mut queued: HashSet<ResumeKey> = HashSet::new();
    for row in rows {
        if row.liberated_status != LiberationStatus::OpenSource {
            continue;
        }
        let key = (row.document_id.clone(), row.accession_id.clone());
        if finished.contains(&key) || !queued.insert(key) {
            continue;
        }
        by_document
            .entry(row.document_id.clone())
            .or_default()
            .push(row);
    }

    let mut summary = ContextSummary {
        pending: queued.len(),
        ..ContextSummary::default()
    };
    info!(
        "[biobroker:context] {} deposits pending across {} documents",
        summary.pending,
        by_document.len()
    );

    let ids: Vec<DocumentId> = by_document.keys().cloned().collect();
    let batches: Vec<&[DocumentId]> = ids.chunks(config.batch_size.max(1)).collect();
    for (batch_idx, batch) in batches.iter().enumerate() {
        let documents = match source.fetch_by_ids(batch) {
            Ok(documents) => documents,
            Err(err) => {
                warn!("[biobroker:context] batch {} failed: {err}", batch_idx + 1);
                summary.failed_batches += 1;
                continue;
            }
        };
        let texts: HashMap<&str, String> = documents
            .iter()
            .map(|doc| (doc.document_id.as_str(), doc.full_text()))
            .collect();

        let mut out = Vec::new();
        for document_id in batch.iter() {
            let full_text = texts.get(document_id.as_str()).map(String::as_str).unwrap_or("");
            for row in by_document.get(document_id).into_iter().flatten() {
                let context_snippet = locator.locate(full_text, &row.accession_id);
                if context_snippet.is_empty() {
                    summary.empty_snippets += 1;
                }
                out.push(ContextRow {
                    accession_id: row.accession_id.clone(),
                    repository: row.repository.clone(),
                    document_id: row.document_id.clone(),
                    title: row.title.clone(),
                    context_snippet,
                });
            }
        }
        checkpoint.append(&out)?;
        summary.snippets_written += out.len();
        info!(
            "[biobroker:context] batch {}/{} done, {} snippets saved",
            batch_idx + 1,
            batches.len(),
            summary.snippets_written
        );
        if config.pause_ms > 0 && batch_idx + 1 < batches.len() {
            thread::sleep(Duration::from_millis(config.pause_ms));
        }
    }

    info!(
        "[biobroker:context] complete: {} snippets, {} empty, {} failed batches",
        summary.snippets_written, summary.empty_snippets, summary.failed_batches
    );
    Ok(summary)
}

/// Record for one context row. Never fails; generator and parse failures
/// yield a `JSON Failed` row carrying the raw output.
pub fn enrich_row(
    generator: &mut dyn TextGenerator,
    reconciler: &Reconciler,
    row: &ContextRow,
    config: &EnrichmentConfig,
) -> BioAssetRecord {
    if row.context_snippet.chars().count() < config.min_snippet_chars {
        return BioAssetRecord::unknown_for(row, EnrichmentStatus::SkippedEmpty);
    }
    let prompt = enrichment_prompt(
        &row.title,
        &row.context_snippet,
        &row.accession_id,
        config.prompt_snippet_chars,
    );
    let raw = match generator.generate(&prompt) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(
                "[biobroker:enrich] generation failed for {} / {}: {err}",
                row.document_id, row.accession_id
            );
            return failed_record(row, "", config);
        }
    };

    let parsed = match reconciler.parse_answer(&raw) {
        Err(AnswerFailure::NoObject) => match generator.generate(&repair_prompt(&raw)) {
            Ok(repaired) => reconciler.parse_answer(&repaired),
            Err(err) => {
                debug!("[biobroker:enrich] repair prompt failed: {err}");
                Err(AnswerFailure::NoObject)
            }
        },
        other => other,
    };

    match parsed {
        Ok(answer) => {
            let mut record = BioAssetRecord::unknown_for(row, EnrichmentStatus::Success);
            record.apply_answer(answer);
            record
        }
        Err(failure) => {
            debug!(
                "[biobroker:enrich] unparseable answer for {} / {}: {failure:?}",
                row.document_id, row.accession_id
            );
            failed_record(row, &raw, config)
        }
    }
}

fn failed_record(row: &ContextRow, raw: &str, config: &EnrichmentConfig) -> BioAssetRecord {
    let mut record = BioAssetRecord::unknown_for(row, EnrichmentStatus::JsonFailed);
    record.name = PARSE_ERROR.to_string();
    record.strain = SEE_RAW.to_string();
    record.category = SEE_RAW.to_string();
    record.application = SEE_RAW.to_string();
    let flattened = raw.replace(['\n', '\r'], " ");
    record.raw_response = truncate_chars(&flattened, config.raw_fallback_chars);
    record
}

/// Stage 3: structured descriptions from the text generator.
pub fn run_enrichment(
    generator: &mut dyn TextGenerator,
    reconciler: &Reconciler,
    config: &EnrichmentConfig,
) -> Result<EnrichmentSummary, MinerError> {
    let rows = read_required::<ContextRow>(&config.input)?;
    if config.probe_generator {
        generator.probe()?;
        info!("[biobroker:enrich] generator answered readiness probe");
    }
    let checkpoint = CheckpointFile::<BioAssetRecord>::open(&config.output)?;
    let mut finished = checkpoint.resume_keys();
    let pending: Vec<&ContextRow> = rows
        .iter()
        .filter(|row| {
            finished.insert((row.document_id.clone(), row.accession_id.clone()))
        })
        .collect();

    let mut summary = EnrichmentSummary {
        pending: pending.len(),
        ..EnrichmentSummary::default()
    };
    info!(
        "[biobroker:enrich] {} of {} snippets pending",
        summary.pending,
        rows.len()
    );

    let flush_every = config.flush_every.max(1);
    let mut buffer = Vec::with_capacity(flush_every);
    for row in pending {
        let record = enrich_row(generator, reconciler, row, config);
        match record.status {
            EnrichmentStatus::Success => summary.success += 1,
            EnrichmentStatus::SkippedEmpty => summary.skipped_empty += 1,
            EnrichmentStatus::JsonFailed => summary.json_failed += 1,
            EnrichmentStatus::Rescued => {}
        }
        buffer.push(record);
        if buffer.len() >= flush_every {
            checkpoint.append(&buffer)?;
            summary.written += buffer.len();
            if let Some(last) = buffer.last() {
                let label = if last.has_known_name() {
                    last.name.as_str()
                } else {
                    last.status.label()
                };
                info!(
                    "[biobroker:enrich] processed {}/{} | last: {label}",
                    summary.written, summary.pending
                );
            }
            buffer.clear();
        }
    }
    if !buffer.is_empty() {
        checkpoint.append(&buffer)?;
        summary.written += buffer.len();
    }

    info!(
        "[biobroker:enrich] complete: {} success, {} skipped, {} failed",
        summary.success, summary.skipped_empty, summary.json_failed
    );
    Ok(summary)
}

/// Stage 4: rescue failed answers and migrate generic names into a new file.
pub fn run_refine(
    reconciler: &Reconciler,
    config: &RefineConfig,
) -> Result<ReconcileStats, MinerError> {
    let records = read_required::<BioAssetRecord>(&config.input)?;
    let (refined, stats) = reconciler.refine(&records);
    overwrite_rows(&config.output, &refined)?;
    info!(
        "[biobroker:refine] {} records: {} rescued, {} human, {} hybridoma, {} plasmid/vector, {} generic class",
        stats.total,
        stats.rescued,
        stats.human,
        stats.hybridoma,
        stats.plasmid_vector,
        stats.generic_class
    );
    Ok(stats)
}

/// Stage 5: embed named records and persist the catalog.
pub fn run_catalog(
    embedder: &mut dyn Embedder,
    config: &CatalogConfig,
) -> Result<(Catalog, CatalogSummary), MinerError> {
    let records: Vec<BioAssetRecord> = read_required::<BioAssetRecord>(&config.input)?
        .into_iter()
        .filter(BioAssetRecord::has_known_name)
        .collect();
    let snippets = load_snippets(config)?;
    let mut summary = CatalogSummary {
        eligible: records.len(),
        ..CatalogSummary::default()
    };
    info!("[biobroker:catalog] {} named assets to embed", summary.eligible);

    let mut catalog = Catalog::new();
    for batch in records.chunks(config.embed_batch_size.max(1)) {
        let documents: Vec<String> = batch
            .iter()
            .map(|record| {
                let key = (record.document_id.clone(), record.accession_id.clone());
                let snippet = snippets.get(&key).map(String::as_str).unwrap_or("");
                rich_document(record, snippet)
            })
            .collect();
        let vectors = match embedder.embed(&documents) {
            Ok(vectors) => vectors,
            Err(err) => {
                warn!("[biobroker:catalog] embedding batch failed: {err}");
                summary.failed_batches += 1;
                continue;
            }
        };
        for (record, vector) in batch.iter().zip(vectors) {
            match catalog.insert(CatalogEntry::from(record), vector) {
                Ok(()) => summary.embedded += 1,
                Err(err) => warn!(
                    "[biobroker:catalog] skipping {} / {}: {err}",
                    record.document_id, record.accession_id
                ),
            }
        }
    }

    catalog.save(&config.output)?;
    Ok((catalog, summary))
}

fn load_snippets(config: &CatalogConfig) -> Result<HashMap<ResumeKey, String>, MinerError> {
    let Some(path) = &config.contexts else {
        return Ok(HashMap::new());
    };
    if !path.exists() {
        warn!(
            "[biobroker:catalog] context file {} not found; embedding without snippets",
            path.display()
        );
        return Ok(HashMap::new());
    }
    Ok(read_rows::<ContextRow>(path)?
        .rows
        .into_iter()
        .map(|row| ((row.document_id, row.accession_id), row.context_snippet))
        .collect())
}
