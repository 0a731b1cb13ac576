use std::fs;
use std::path::Path;

use biobroker::checkpoint::read_rows;
use biobroker::pipeline::run_extraction;
use biobroker::{
    CheckpointFile, ExtractionConfig, ExtractionRow, Extractor, InMemoryPatentSource,
    PatentDocument,
};
use tempfile::TempDir;

const HEADER: &str =
    "document_id,title,repository,accession_id,liberated_status,found_in_claims\n";

fn corpus() -> Vec<PatentDocument> {
    vec![
        PatentDocument {
            document_id: "doc-a".into(),
            title: "Recombinant antibody production".into(),
            description: "deposited as ATCC Accession No. PTA-12345".into(),
            claims: "1. A cell line ATCC PTA-12345.".into(),
        },
        PatentDocument {
            document_id: "doc-b".into(),
            title: "Fermentation process".into(),
            description: "Reference strain DSM 1234 was used.".into(),
            claims: "1. A method.".into(),
        },
    ]
}

fn extract_into(path: &Path) -> biobroker::ExtractionSummary {
    let source = InMemoryPatentSource::new(corpus(), 10);
    let config = ExtractionConfig {
        output: path.to_path_buf(),
        max_pages: None,
    };
    run_extraction(&source, &Extractor::builtin().unwrap(), &config).unwrap()
}

#[test]
fn absent_checkpoint_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deposits.csv");
    let summary = extract_into(&path);
    assert_eq!(summary.deposits_written, 2);
    assert!(fs::read_to_string(&path).unwrap().starts_with(HEADER));
}

#[test]
fn empty_checkpoint_gets_a_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deposits.csv");
    fs::write(&path, "").unwrap();

    let summary = extract_into(&path);
    assert_eq!(summary.skipped_resumed, 0);
    assert_eq!(summary.deposits_written, 2);

    let contents = read_rows::<ExtractionRow>(&path).unwrap();
    assert_eq!(contents.rows.len(), 2);
    assert_eq!(contents.skipped, 0);
}

#[test]
fn interrupted_trailing_row_is_skipped_and_work_resumes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deposits.csv");
    fs::write(
        &path,
        format!(
            "{HEADER}doc-a,Recombinant antibody production,ATCC,PTA-12345,OPEN SOURCE,true\ndoc-b,Ferm"
        ),
    )
    .unwrap();

    let summary = extract_into(&path);
    assert_eq!(summary.skipped_resumed, 1);
    assert_eq!(summary.deposits_written, 1);

    let contents = read_rows::<ExtractionRow>(&path).unwrap();
    assert_eq!(contents.skipped, 1);
    let keys: Vec<(&str, &str)> = contents
        .rows
        .iter()
        .map(|row| (row.document_id.as_str(), row.accession_id.as_str()))
        .collect();
    assert_eq!(keys, vec![("doc-a", "PTA-12345"), ("doc-b", "1234")]);
}

#[test]
fn rows_without_keys_are_not_treated_as_finished() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deposits.csv");
    fs::write(
        &path,
        format!("{HEADER}doc-a,Recombinant antibody production,ATCC,,OPEN SOURCE,true\n"),
    )
    .unwrap();

    let checkpoint = CheckpointFile::<ExtractionRow>::open(&path).unwrap();
    assert!(checkpoint.resume_keys().is_empty());

    let summary = extract_into(&path);
    assert_eq!(summary.skipped_resumed, 0);
    assert_eq!(summary.deposits_written, 2);
}
