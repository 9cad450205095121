use crate::config::types::SourceConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open input '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed input: {0}")]
    Csv(#[from] csv::Error),

    #[error("input is missing required column '{column}' (found: {found})")]
    MissingColumn { column: String, found: String },
}

/// One input record. Identity is the case-insensitive `word`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub word: String,
    pub translation: String,
}

impl WorkItem {
    pub fn new(word: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            translation: translation.into(),
        }
    }

    pub fn key(&self) -> String {
        normalize_key(&self.word)
    }
}

/// Canonical form used for every key comparison.
pub fn normalize_key(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Reads work items from a CSV file with a header row.
#[derive(Debug, Clone)]
pub struct ItemSource {
    path: PathBuf,
    key_column: String,
    value_column: String,
}

impl ItemSource {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            path: config.path.clone(),
            key_column: config.key_column.clone(),
            value_column: config.value_column.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<WorkItem>, SourceError> {
        let file = File::open(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let items = self.load_from_reader(file)?;
        info!(
            path = %self.path.display(),
            items = items.len(),
            "Loaded work items"
        );
        Ok(items)
    }

    /// Rows whose key is empty or not valid UTF-8 are skipped; duplicate keys
    /// keep the first occurrence.
    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<Vec<WorkItem>, SourceError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let key_idx = find_column(&headers, &self.key_column)?;
        let value_idx = find_column(&headers, &self.value_column)?;

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        let mut skipped = 0usize;
        let mut duplicates = 0usize;

        // Byte records so a row with a non-UTF-8 key is skipped instead of
        // failing the whole input.
        for record in csv_reader.byte_records() {
            let record = record?;
            let word = match std::str::from_utf8(record.get(key_idx).unwrap_or_default()) {
                Ok(word) => word.trim(),
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            if word.is_empty() {
                skipped += 1;
                continue;
            }
            if !seen.insert(normalize_key(word)) {
                duplicates += 1;
                continue;
            }
            let translation = String::from_utf8_lossy(record.get(value_idx).unwrap_or_default());
            items.push(WorkItem::new(word, translation.trim()));
        }

        debug!(skipped, duplicates, "Filtered input rows");
        Ok(items)
    }
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Result<usize, SourceError> {
    let wanted = name.trim().to_lowercase();
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase() == wanted)
        .ok_or_else(|| SourceError::MissingColumn {
            column: name.to_string(),
            found: headers.iter().collect::<Vec<_>>().join(", "),
        })
}

/// Narrows which items a run attempts.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    prefix: Option<String>,
}

impl Selector {
    pub fn new(prefix: Option<&str>) -> Self {
        Self {
            prefix: prefix.map(normalize_key),
        }
    }

    pub fn matches(&self, item: &WorkItem) -> bool {
        match &self.prefix {
            Some(prefix) => item.key().starts_with(prefix.as_str()),
            None => true,
        }
    }
}
