//! Delimited checkpoint files shared by every stage.
//!
//! Each stage appends completed rows after every batch. A restarted run reads
//! the file back, skips rows it cannot parse, and derives the resume key set
//! from the rows that did parse.

use std::collections::HashSet;
use std::hash::Hash;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::data::{BioAssetRecord, ContextRow, ExtractionRow};
use crate::errors::MinerError;
use crate::types::ResumeKey;

/// Row type persisted in a checkpoint file.
pub trait CheckpointRow: Serialize + DeserializeOwned {
    /// Column names, in serialization order.
    const HEADER: &'static [&'static str];

    /// `(document_id, identifier)` for completed rows; `None` when either is blank.
    fn resume_key(&self) -> Option<ResumeKey>;
}

fn key_from(document_id: &str, accession_id: &str) -> Option<ResumeKey> {
    let document_id = document_id.trim();
    let accession_id = accession_id.trim();
    if document_id.is_empty() || accession_id.is_empty() {
        return None;
    }
    Some((document_id.to_string(), accession_id.to_string()))
}

impl CheckpointRow for ExtractionRow {
    const HEADER: &'static [&'static str] = &[
        "document_id",
        "title",
        "repository",
        "accession_id",
        "liberated_status",
        "found_in_claims",
    ];

    fn resume_key(&self) -> Option<ResumeKey> {
        key_from(&self.document_id, &self.accession_id)
    }
}

impl CheckpointRow for ContextRow {
    const HEADER: &'static [&'static str] = &[
        "accession_id",
        "repository",
        "document_id",
        "title",
        "context_snippet",
    ];

    fn resume_key(&self) -> Option<ResumeKey> {
        key_from(&self.document_id, &self.accession_id)
    }
}

impl CheckpointRow for BioAssetRecord {
    const HEADER: &'static [&'static str] = &[
        "accession_id",
        "repository",
        "document_id",
        "title",
        "name",
        "strain",
        "category",
        "application",
        "status",
        "raw_response",
    ];

    fn resume_key(&self) -> Option<ResumeKey> {
        key_from(&self.document_id, &self.accession_id)
    }
}

/// Rows read back from a checkpoint, plus how many were unreadable.
#[derive(Debug)]
pub struct CheckpointContents<R> {
    /// Rows that parsed.
    pub rows: Vec<R>,
    /// Rows that did not.
    pub skipped: usize,
}

/// Append-only checkpoint file holding rows of type `R`.
#[derive(Debug)]
pub struct CheckpointFile<R> {
    path: PathBuf,
    _row: PhantomData<R>,
}

impl<R: CheckpointRow> CheckpointFile<R> {
    /// Open `path`, creating it with a header when absent or empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let checkpoint = Self {
            path,
            _row: PhantomData,
        };
        if checkpoint.is_blank()? {
            checkpoint.write_header()?;
            info!(
                "[biobroker:checkpoint] created output file {}",
                checkpoint.path.display()
            );
        } else {
            info!(
                "[biobroker:checkpoint] appending to {}",
                checkpoint.path.display()
            );
        }
        Ok(checkpoint)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_blank(&self) -> Result<bool, MinerError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(err) => Err(err.into()),
        }
    }

    fn write_header(&self) -> Result<(), MinerError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(R::HEADER)?;
        writer.flush()?;
        Ok(())
    }

    /// Every parseable row; unparseable rows are counted and skipped.
    pub fn read(&self) -> Result<CheckpointContents<R>, MinerError> {
        read_rows(&self.path)
    }

    /// Keys of completed rows. An unreadable file yields an empty set.
    pub fn resume_keys(&self) -> HashSet<ResumeKey> {
        self.keys_by(CheckpointRow::resume_key)
    }

    /// Keys derived by `key` from every readable row; rows mapping to `None`
    /// are ignored. An unreadable file yields an empty set.
    pub fn keys_by<K, F>(&self, key: F) -> HashSet<K>
    where
        K: Eq + Hash,
        F: Fn(&R) -> Option<K>,
    {
        match self.read() {
            Ok(contents) => {
                let keys: HashSet<K> = contents.rows.iter().filter_map(key).collect();
                if !keys.is_empty() {
                    info!(
                        "[biobroker:checkpoint] resuming: {} keys already finished in {}",
                        keys.len(),
                        self.path.display()
                    );
                }
                keys
            }
            Err(err) => {
                warn!(
                    "[biobroker:checkpoint] could not read {} ({err}); appending without resume",
                    self.path.display()
                );
                HashSet::new()
            }
        }
    }

    /// Append `rows` and flush. A partial trailing line from an interrupted
    /// run is terminated first so new rows start on their own line.
    pub fn append(&self, rows: &[R]) -> Result<(), MinerError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        if !ends_with_newline(&mut file)? {
            file.write_all(b"\n")?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn ends_with_newline(file: &mut File) -> Result<bool, MinerError> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Read rows from `path`, skipping unparseable ones. A missing file reads as empty.
pub fn read_rows<R: CheckpointRow>(path: &Path) -> Result<CheckpointContents<R>, MinerError> {
    if !path.exists() {
        return Ok(CheckpointContents {
            rows: Vec::new(),
            skipped: 0,
        });
    }
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in reader.deserialize::<R>() {
        match result {
            Ok(row) => rows.push(row),
            Err(err) => {
                skipped += 1;
                warn!(
                    "[biobroker:checkpoint] skipping unreadable row in {}: {err}",
                    path.display()
                );
            }
        }
    }
    Ok(CheckpointContents { rows, skipped })
}

/// Read a stage input that must exist.
pub fn read_required<R: CheckpointRow>(path: &Path) -> Result<Vec<R>, MinerError> {
    if !path.exists() {
        return Err(MinerError::MissingInput(path.to_path_buf()));
    }
    let contents = read_rows::<R>(path)?;
    if contents.skipped > 0 {
        warn!(
            "[biobroker:checkpoint] {} unreadable rows skipped in {}",
            contents.skipped,
            path.display()
        );
    }
    Ok(contents.rows)
}

/// Replace `path` with a header plus `rows`, via a sibling `.part` file.
pub fn overwrite_rows<R: CheckpointRow>(path: &Path, rows: &[R]) -> Result<(), MinerError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let temp = path.with_extension("part");
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&temp)?;
        writer.write_record(R::HEADER)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    fs::rename(&temp, path)?;
    Ok(())
}
