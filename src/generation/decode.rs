use super::GenerationFailure;
use crate::source::{normalize_key, WorkUnit};
use crate::storage::GenerationResult;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

type Entry = Map<String, Value>;

/// Decode the service's reply for `unit` and validate every declared field.
///
/// When every entry echoes a `word`, entries are matched to items by key and
/// items without a valid entry are dropped. Otherwise entries must line up
/// one-to-one with the unit's items and all of them must be valid.
pub fn decode_unit(
    content: &str,
    unit: &WorkUnit,
    fields: &[String],
) -> Result<Vec<GenerationResult>, GenerationFailure> {
    let body = strip_code_fence(content);
    if body.is_empty() {
        return Err(GenerationFailure::EmptyResponse);
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| GenerationFailure::Malformed(format!("not valid JSON: {}", e)))?;
    let entries = into_entries(value)?;
    if entries.is_empty() {
        return Err(GenerationFailure::Validation("response contained no entries".to_string()));
    }

    // Echoed words let entries be matched regardless of order and give
    // partial credit. Without them only a strict one-to-one alignment is
    // trustworthy.
    let keyed = entries.iter().filter(|e| echoed_word(e).is_some()).count();
    if keyed == entries.len() {
        decode_keyed(entries, unit, fields)
    } else if keyed == 0 {
        decode_positional(entries, unit, fields)
    } else {
        Err(GenerationFailure::Malformed(format!(
            "{} of {} entries carry a 'word'",
            keyed,
            entries.len()
        )))
    }
}

fn decode_keyed(
    entries: Vec<Entry>,
    unit: &WorkUnit,
    fields: &[String],
) -> Result<Vec<GenerationResult>, GenerationFailure> {
    // First entry per word wins if the service repeats itself.
    let mut by_key: HashMap<String, Entry> = HashMap::new();
    for entry in entries {
        if let Some(word) = echoed_word(&entry) {
            by_key.entry(normalize_key(word)).or_insert(entry);
        }
    }

    let mut results = Vec::with_capacity(unit.len());
    for item in unit.items() {
        let Some(entry) = by_key.get(&item.key()) else {
            debug!(word = %item.word, "No entry returned for item");
            continue;
        };
        match validate_entry(entry, fields) {
            Ok(generated) => results.push(GenerationResult::new(item, generated)),
            Err(reason) => debug!(word = %item.word, reason = %reason, "Dropped invalid entry"),
        }
    }

    // Nothing usable at all is a failure of the unit, not an empty success.
    if results.is_empty() {
        return Err(GenerationFailure::Validation(format!(
            "no valid entry matched any of {:?}",
            unit.words()
        )));
    }
    Ok(results)
}

fn decode_positional(
    entries: Vec<Entry>,
    unit: &WorkUnit,
    fields: &[String],
) -> Result<Vec<GenerationResult>, GenerationFailure> {
    if entries.len() != unit.len() {
        return Err(GenerationFailure::Validation(format!(
            "expected {} entries, got {}",
            unit.len(),
            entries.len()
        )));
    }

    unit.items()
        .iter()
        .zip(entries.iter())
        .map(|(item, entry)| {
            validate_entry(entry, fields)
                .map(|generated| GenerationResult::new(item, generated))
                .map_err(|reason| {
                    GenerationFailure::Validation(format!("entry for '{}': {}", item.word, reason))
                })
        })
        .collect()
}

/// Accepts an array of objects, a single object, or an object whose only
/// member is such an array.
fn into_entries(value: Value) -> Result<Vec<Entry>, GenerationFailure> {
    match value {
        Value::Array(values) => values
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => Ok(map),
                other => Err(GenerationFailure::Malformed(format!(
                    "expected an object, got {}",
                    type_name(&other)
                ))),
            })
            .collect(),
        Value::Object(map) => {
            if map.len() == 1 && map.values().all(Value::is_array) {
                let (_, inner) = map.into_iter().next().unwrap_or_default();
                return into_entries(inner);
            }
            Ok(vec![map])
        }
        other => Err(GenerationFailure::Malformed(format!(
            "expected an object or array, got {}",
            type_name(&other)
        ))),
    }
}

fn echoed_word(entry: &Entry) -> Option<&str> {
    entry
        .get("word")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|w| !w.is_empty())
}

fn validate_entry(entry: &Entry, fields: &[String]) -> Result<BTreeMap<String, String>, String> {
    fields
        .iter()
        .map(|field| {
            entry
                .get(field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (field.clone(), v.to_string()))
                .ok_or_else(|| format!("missing or empty field '{}'", field))
        })
        .collect()
}

/// Strip a surrounding Markdown code fence such as ```` ```json ... ``` ````.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        // Single-line fence: drop a language tag such as `json` before the body.
        None => rest
            .find(|c: char| c == '{' || c == '[')
            .map_or(rest, |start| &rest[start..]),
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
