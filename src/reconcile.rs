//! Structured-answer reconciliation.
//!
//! Generated answers are chatty, fenced, truncated, or plain broken. This
//! module finds the answer object, parses it into `BioAnswer`, salvages
//! fields from answers that never parsed, and moves generic category words
//! out of the name field.

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::reconcile::{
    CATEGORY_HUMAN_CELL_LINE, CATEGORY_HYBRIDOMA, CATEGORY_PLASMID_VECTOR, GENERIC_CLASS_NAMES,
    MIN_RESCUE_CHARS, REPLACEABLE_CATEGORIES, UNKNOWN,
};
use crate::data::{BioAnswer, BioAssetRecord, EnrichmentStatus};
use crate::errors::MinerError;
use crate::metrics::ReconcileStats;
use crate::utils::title_case;

/// Why a structured answer could not be turned into a `BioAnswer`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnswerFailure {
    /// No fenced block and no balanced `{ ... }` object.
    NoObject,
    /// An object was found but is not valid JSON.
    Malformed(String),
    /// Valid JSON, but not an object.
    NotAnObject,
}

/// Generic-term migration applied to a record, in priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Migration {
    /// Name was exactly "human".
    Human,
    /// Name mentions a hybridoma.
    Hybridoma,
    /// Name mentions a plasmid or vector.
    PlasmidVector,
    /// Name was a bare organism class.
    GenericClass,
}

/// Compiled patterns for answer repair and field rescue.
#[derive(Clone, Debug)]
pub struct Reconciler {
    fenced_json: Regex,
    fenced_any: Regex,
    rescue_name: Regex,
    rescue_category: Regex,
    rescue_application: Regex,
}

impl Reconciler {
    /// Compile the repair and rescue patterns.
    pub fn new() -> Result<Self, MinerError> {
        Ok(Self {
            fenced_json: Regex::new(r"(?s)```json\s*(\{.*?\})\s*```")?,
            fenced_any: Regex::new(r"(?s)```\s*(\{.*?\})\s*```")?,
            rescue_name: rescue_pattern("name")?,
            rescue_category: rescue_pattern("category")?,
            rescue_application: rescue_pattern("application")?,
        })
    }

    /// Locate the answer object inside free-form text.
    ///
    /// Tries a ```` ```json ```` fence, then any fence, then brace counting from
    /// the first `{`. Returns `None` when no balanced object exists.
    pub fn extract_object<'t>(&self, text: &'t str) -> Option<&'t str> {
        for fence in [&self.fenced_json, &self.fenced_any] {
            if let Some(inner) = fence.captures(text).and_then(|caps| caps.get(1)) {
                return Some(inner.as_str());
            }
        }
        balanced_object(text)
    }

    /// Parse the answer object found in `text`.
    pub fn parse_answer(&self, text: &str) -> Result<BioAnswer, AnswerFailure> {
        let object = self.extract_object(text).ok_or(AnswerFailure::NoObject)?;
        let value: Value = serde_json::from_str(object)
            .map_err(|err| AnswerFailure::Malformed(err.to_string()))?;
        let Value::Object(map) = value else {
            return Err(AnswerFailure::NotAnObject);
        };
        Ok(BioAnswer {
            name: answer_field(&map, "name"),
            strain: answer_field(&map, "strain"),
            category: answer_field(&map, "category"),
            application: answer_field(&map, "application"),
        })
    }

    /// Field-level recovery from raw text that failed strict parsing.
    ///
    /// Accepted only when the name or the category was recovered. The strain
    /// is not recovered and stays `Unknown` in the returned answer.
    pub fn rescue(&self, raw: &str) -> Option<BioAnswer> {
        if raw.chars().count() < MIN_RESCUE_CHARS {
            return None;
        }
        let grab = |pattern: &Regex| {
            pattern
                .captures(raw)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| UNKNOWN.to_string())
        };
        let name = grab(&self.rescue_name);
        let category = grab(&self.rescue_category);
        if name == UNKNOWN && category == UNKNOWN {
            return None;
        }
        Some(BioAnswer {
            name,
            category,
            application: grab(&self.rescue_application),
            ..BioAnswer::default()
        })
    }

    /// Rescue a failed record in place. Returns true when the rescue was accepted.
    pub fn rescue_record(&self, record: &mut BioAssetRecord) -> bool {
        if !record.status.is_failure() {
            return false;
        }
        let Some(answer) = self.rescue(&record.raw_response) else {
            return false;
        };
        record.name = answer.name;
        record.category = answer.category;
        record.application = answer.application;
        record.status = EnrichmentStatus::Rescued;
        true
    }

    /// Rescue failed records, then migrate generic names, on a copy of `records`.
    pub fn refine(&self, records: &[BioAssetRecord]) -> (Vec<BioAssetRecord>, ReconcileStats) {
        let mut stats = ReconcileStats::default();
        let refined = records
            .iter()
            .map(|original| {
                let mut record = original.clone();
                if self.rescue_record(&mut record) {
                    stats.rescued += 1;
                }
                if let Some(migration) = migrate_generic_name(&mut record) {
                    debug!(
                        "[biobroker:refine] {:?} migration for {} / {}",
                        migration, record.document_id, record.accession_id
                    );
                    stats.record_migration(migration);
                }
                stats.total += 1;
                record
            })
            .collect();
        (refined, stats)
    }
}

fn rescue_pattern(field: &str) -> Result<Regex, MinerError> {
    Ok(RegexBuilder::new(&format!(r#""{field}"\s*:\s*"([^"]+)""#))
        .case_insensitive(true)
        .build()?)
}

/// Substring from the first `{` to its matching `}` by depth counting.
pub fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn answer_field(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(text)) if !text.trim().is_empty() => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

/// Move a generic term out of the name field.
///
/// Checks run in priority order and the first match wins: exact "human",
/// "hybridoma" substring, "plasmid"/"vector" substring, then an exact
/// organism-class word. The class word only replaces a placeholder category.
pub fn migrate_generic_name(record: &mut BioAssetRecord) -> Option<Migration> {
    let name = record.name.trim().to_string();
    let lowered = name.to_lowercase();

    let migration = if lowered == "human" {
        record.category = CATEGORY_HUMAN_CELL_LINE.to_string();
        Migration::Human
    } else if lowered.contains("hybridoma") {
        record.category = CATEGORY_HYBRIDOMA.to_string();
        Migration::Hybridoma
    } else if lowered.contains("plasmid") || lowered.contains("vector") {
        record.category = CATEGORY_PLASMID_VECTOR.to_string();
        Migration::PlasmidVector
    } else if GENERIC_CLASS_NAMES.contains(&lowered.as_str()) {
        if REPLACEABLE_CATEGORIES.contains(&record.category.trim()) {
            record.category = title_case(&name);
        }
        Migration::GenericClass
    } else {
        return None;
    };
    record.name = UNKNOWN.to_string();
    Some(migration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, category: &str, status: EnrichmentStatus) -> BioAssetRecord {
        BioAssetRecord {
            accession_id: "PTA-1".into(),
            repository: "ATCC".into(),
            document_id: "doc".into(),
            title: "title".into(),
            name: name.into(),
            strain: UNKNOWN.into(),
            category: category.into(),
            application: UNKNOWN.into(),
            status,
            raw_response: String::new(),
        }
    }

    #[test]
    fn fenced_json_block_is_preferred() {
        let reconciler = Reconciler::new().unwrap();
        let text = "Sure!\n```json\n{\"name\": \"Bacillus subtilis\"}\n```";
        let answer = reconciler.parse_answer(text).unwrap();
        assert_eq!(answer.name, "Bacillus subtilis");
        assert_eq!(answer.category, UNKNOWN);
    }

    #[test]
    fn unlabeled_fence_and_bare_object_are_found() {
        let reconciler = Reconciler::new().unwrap();
        assert_eq!(
            reconciler.extract_object("```\n{\"a\": 1}\n```"),
            Some("{\"a\": 1}")
        );
        assert_eq!(
            reconciler.extract_object("Here: {\"a\": {\"b\": 2}} trailing } text"),
            Some("{\"a\": {\"b\": 2}}")
        );
    }

    #[test]
    fn truncated_or_braceless_text_fails() {
        let reconciler = Reconciler::new().unwrap();
        assert_eq!(
            reconciler.parse_answer("{\"name\": \"E. coli\", \"strain\": "),
            Err(AnswerFailure::NoObject)
        );
        assert_eq!(
            reconciler.parse_answer("I could not find anything."),
            Err(AnswerFailure::NoObject)
        );
        assert!(matches!(
            reconciler.parse_answer("{name: E. coli}"),
            Err(AnswerFailure::Malformed(_))
        ));
    }

    #[test]
    fn rescue_requires_name_or_category() {
        let reconciler = Reconciler::new().unwrap();
        let answer = reconciler
            .rescue(r#"garbage "Name" : "E. coli" and "application": "beer" {"#)
            .unwrap();
        assert_eq!(answer.name, "E. coli");
        assert_eq!(answer.category, UNKNOWN);
        assert_eq!(answer.application, "beer");
        assert!(reconciler.rescue(r#"only "application": "beer" here"#).is_none());
        assert!(reconciler.rescue("short").is_none());
    }

    #[test]
    fn rescue_record_only_touches_failed_rows() {
        let reconciler = Reconciler::new().unwrap();
        let mut failed = record("Parse Error", "See Raw", EnrichmentStatus::JsonFailed);
        failed.raw_response = r#"{"name": "Aspergillus niger", "category": "Fungi""#.into();
        assert!(reconciler.rescue_record(&mut failed));
        assert_eq!(failed.status, EnrichmentStatus::Rescued);
        assert_eq!(failed.category, "Fungi");

        let mut ok = record("Escherichia coli", "Bacteria", EnrichmentStatus::Success);
        ok.raw_response = failed.raw_response.clone();
        assert!(!reconciler.rescue_record(&mut ok));
        assert_eq!(ok.name, "Escherichia coli");
    }

    #[test]
    fn human_name_becomes_human_cell_line() {
        let mut rec = record("Human", UNKNOWN, EnrichmentStatus::Success);
        assert_eq!(migrate_generic_name(&mut rec), Some(Migration::Human));
        assert_eq!(rec.name, UNKNOWN);
        assert_eq!(rec.category, "Human Cell Line");
    }

    #[test]
    fn plasmid_substring_triggers_vector_category() {
        let mut rec = record("Plasmid pBR322", "Other", EnrichmentStatus::Success);
        assert_eq!(migrate_generic_name(&mut rec), Some(Migration::PlasmidVector));
        assert_eq!(rec.name, UNKNOWN);
        assert_eq!(rec.category, "Plasmid/Vector");
    }

    #[test]
    fn first_matching_trigger_wins() {
        let mut rec = record("human hybridoma cell line", UNKNOWN, EnrichmentStatus::Success);
        assert_eq!(migrate_generic_name(&mut rec), Some(Migration::Hybridoma));
        assert_eq!(rec.category, "Hybridoma");
    }

    #[test]
    fn generic_class_respects_existing_category() {
        let mut placeholder = record("yeast", "Other", EnrichmentStatus::Success);
        assert_eq!(
            migrate_generic_name(&mut placeholder),
            Some(Migration::GenericClass)
        );
        assert_eq!(placeholder.category, "Yeast");

        let mut specific = record("Cell Line", "Mammalian Cell Line", EnrichmentStatus::Success);
        assert_eq!(
            migrate_generic_name(&mut specific),
            Some(Migration::GenericClass)
        );
        assert_eq!(specific.name, UNKNOWN);
        assert_eq!(specific.category, "Mammalian Cell Line");
    }

    #[test]
    fn specific_names_are_left_alone() {
        let mut rec = record("Lactobacillus casei", "Bacteria", EnrichmentStatus::Success);
        assert_eq!(migrate_generic_name(&mut rec), None);
        assert_eq!(rec.name, "Lactobacillus casei");
    }

    #[test]
    fn refine_counts_each_transformation() {
        let reconciler = Reconciler::new().unwrap();
        let mut failed = record("Parse Error", "See Raw", EnrichmentStatus::JsonFailed);
        failed.raw_response = r#"{"name": "hybridoma 7B", "category": "Other""#.into();
        let records = vec![
            failed,
            record("Human", UNKNOWN, EnrichmentStatus::Success),
            record("bacteria", UNKNOWN, EnrichmentStatus::Success),
            record("Bacillus subtilis", "Bacteria", EnrichmentStatus::Success),
        ];
        let (refined, stats) = reconciler.refine(&records);
        assert_eq!(records[0].status, EnrichmentStatus::JsonFailed);
        assert_eq!(refined[0].status, EnrichmentStatus::Rescued);
        assert_eq!(refined[0].category, "Hybridoma");
        assert_eq!(refined[2].category, "Bacteria");
        assert_eq!(stats.total, 4);
        assert_eq!(stats.rescued, 1);
        assert_eq!(stats.human, 1);
        assert_eq!(stats.hybridoma, 1);
        assert_eq!(stats.generic_class, 1);
        assert_eq!(stats.plasmid_vector, 0);
    }
}
