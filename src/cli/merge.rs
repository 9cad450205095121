use crate::storage::{write_result_set, CheckpointResultSet, CheckpointStore, PersistenceError};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Union several checkpoint files into `output` and a compact `.min.json` sibling.
///
/// The first file that contains a word wins. Missing or unreadable inputs are skipped.
pub fn merge(inputs: &[PathBuf], output: &Path) -> Result<CheckpointResultSet, PersistenceError> {
    let mut merged = CheckpointResultSet::new();

    for input in inputs {
        if !input.exists() {
            warn!(path = %input.display(), "Skipping missing input");
            continue;
        }
        let set = CheckpointStore::new(input, true).load();
        let loaded = set.len();
        let added = merged.merge(set.iter().cloned());
        info!(path = %input.display(), loaded, added, "Merged checkpoint");
    }

    let compact = min_path(output);
    write_result_set(output, &merged, true)?;
    write_result_set(&compact, &merged, false)?;

    info!(
        entries = merged.len(),
        output = %output.display(),
        compact = %compact.display(),
        "Wrote merged result set"
    );
    Ok(merged)
}

/// `words.json` -> `words.min.json`; other names get `.min.json` appended.
pub fn min_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(".json").unwrap_or(&name);
    output.with_file_name(format!("{}.min.json", stem))
}
