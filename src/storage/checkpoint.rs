use crate::source::{normalize_key, WorkItem};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write checkpoint '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Enrichment output for one item: its word plus every other field
/// (the original translation and the generated fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub word: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl GenerationResult {
    pub fn new(item: &WorkItem, generated: BTreeMap<String, String>) -> Self {
        let mut fields: BTreeMap<String, Value> = generated
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        fields.insert(
            "translation".to_string(),
            Value::String(item.translation.clone()),
        );
        Self {
            word: item.word.clone(),
            fields,
        }
    }

    pub fn key(&self) -> String {
        normalize_key(&self.word)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn translation(&self) -> Option<&str> {
        self.field("translation")
    }
}

/// Every result produced so far, at most one per case-insensitive key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointResultSet {
    entries: BTreeMap<String, GenerationResult>,
}

impl CheckpointResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw JSON entries. Entries without a string `word` are dropped.
    pub fn from_values(values: Vec<Value>) -> Self {
        let mut set = Self::new();
        let mut dropped = 0usize;
        for value in values {
            match serde_json::from_value::<GenerationResult>(value) {
                Ok(result) if !result.word.trim().is_empty() => {
                    set.insert(result);
                }
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!(dropped, "Ignored checkpoint entries without a usable 'word' field");
        }
        set
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize_key(key))
    }

    pub fn get(&self, key: &str) -> Option<&GenerationResult> {
        self.entries.get(&normalize_key(key))
    }

    /// Insert a result unless its key is already present. Returns whether it was added.
    pub fn insert(&mut self, result: GenerationResult) -> bool {
        let key = result.key();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, result);
        true
    }

    /// Insert every result, keeping existing entries on conflict. Returns how many were added.
    pub fn merge<I>(&mut self, results: I) -> usize
    where
        I: IntoIterator<Item = GenerationResult>,
    {
        results
            .into_iter()
            .map(|result| self.insert(result))
            .filter(|added| *added)
            .count()
    }

    /// Results ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &GenerationResult> {
        self.entries.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Flat JSON-array checkpoint file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    pretty: bool,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, pretty: bool) -> Self {
        Self {
            path: path.into(),
            pretty,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint. A missing, empty or unreadable file yields an empty set.
    pub fn load(&self) -> CheckpointResultSet {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No checkpoint found, starting fresh");
                return CheckpointResultSet::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read checkpoint, starting fresh");
                return CheckpointResultSet::new();
            }
        };

        if content.trim().is_empty() {
            info!(path = %self.path.display(), "Checkpoint is empty, starting fresh");
            return CheckpointResultSet::new();
        }

        match serde_json::from_str::<Vec<Value>>(&content) {
            Ok(values) => {
                let set = CheckpointResultSet::from_values(values);
                info!(path = %self.path.display(), entries = set.len(), "Loaded checkpoint");
                set
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Checkpoint is not a JSON array, starting fresh");
                CheckpointResultSet::new()
            }
        }
    }

    /// Overwrite the checkpoint with the full set. The previous file stays intact on failure.
    ///
    /// Serialization happens on the caller's task; the write and fsync run on
    /// the blocking pool so a large flush does not stall the runtime.
    pub async fn save(&self, set: &CheckpointResultSet) -> Result<()> {
        let bytes = encode(set, self.pretty)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_file_atomic(&path, &bytes))
            .await
            .map_err(|e| PersistenceError::Write {
                path: self.path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            })??;
        debug!(path = %self.path.display(), entries = set.len(), "Checkpoint saved");
        Ok(())
    }
}

/// Serialize `set` as a JSON array and move it into place at `path` via a temp file.
pub fn write_result_set(path: &Path, set: &CheckpointResultSet, pretty: bool) -> Result<()> {
    write_file_atomic(path, &encode(set, pretty)?)
}

fn encode(set: &CheckpointResultSet, pretty: bool) -> Result<Vec<u8>> {
    let entries: Vec<&GenerationResult> = set.iter().collect();
    let bytes = if pretty {
        serde_json::to_vec_pretty(&entries)?
    } else {
        serde_json::to_vec(&entries)?
    };
    Ok(bytes)
}

fn write_file_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(write_err)?;

    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("checkpoint");
    let tmp = parent.join(format!(
        ".{}.{}.{}.tmp",
        filename,
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));

    let written = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(e));
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(e));
    }

    Ok(())
}
