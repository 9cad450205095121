#![allow(dead_code)]

use async_trait::async_trait;
use lexifill::config::parse::parse_config_str;
use lexifill::config::Config;
use lexifill::generation::{GenerationFailure, Generator};
use lexifill::source::WorkUnit;
use lexifill::storage::GenerationResult;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-process stand-in for the generation service.
#[derive(Default)]
pub struct ScriptedGenerator {
    /// Units containing any of these words fail.
    pub fail_words: HashSet<String>,
    /// Units containing any of these words never complete.
    pub hang_words: HashSet<String>,
    pub calls: Mutex<Vec<Vec<String>>>,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn failing(words: &[&str]) -> Self {
        Self {
            fail_words: words.iter().map(|w| w.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn hanging(words: &[&str]) -> Self {
        Self {
            hang_words: words.iter().map(|w| w.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn attempted_words(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, unit: &WorkUnit) -> Result<Vec<GenerationResult>, GenerationFailure> {
        let words: Vec<String> = unit.items().iter().map(|i| i.word.clone()).collect();
        self.calls.lock().unwrap().push(words.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;

        if words.iter().any(|w| self.hang_words.contains(w)) {
            std::future::pending::<()>().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if words.iter().any(|w| self.fail_words.contains(w)) {
            return Err(GenerationFailure::Validation("scripted failure".to_string()));
        }

        Ok(unit
            .items()
            .iter()
            .map(|item| {
                GenerationResult::new(
                    item,
                    BTreeMap::from([
                        ("pos".to_string(), "n.".to_string()),
                        ("sentence".to_string(), format!("I saw a {}.", item.word)),
                    ]),
                )
            })
            .collect())
    }
}

/// Write `csv` into `dir` and build a config pointing at it.
pub fn test_config(dir: &Path, csv: &str, concurrency: usize, unit_size: usize) -> Config {
    let input = dir.join("words.csv");
    std::fs::write(&input, csv).unwrap();

    let yaml = format!(
        r#"
source:
  path: {input}
checkpoint:
  path: {output}
service:
  base_url: http://127.0.0.1:9/v1
  model: test-model
task:
  template: "Enrich: {{items}}"
  fields: [pos, sentence]
scheduler:
  concurrency: {concurrency}
  unit_size: {unit_size}
"#,
        input = input.display(),
        output = dir.join("out").join("words.json").display(),
        concurrency = concurrency,
        unit_size = unit_size,
    );
    parse_config_str(&yaml).unwrap()
}
