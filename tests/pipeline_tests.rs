mod common;

use common::{test_config, ScriptedGenerator};
use lexifill::pipeline::{Pipeline, PipelineError, RunSummary};
use lexifill::storage::CheckpointStore;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const APPLE_BEE: &str = "word,translation\napple,苹果\napple,苹果2\nbee,蜂\n";

fn checkpoint(config: &lexifill::config::Config) -> lexifill::storage::CheckpointResultSet {
    CheckpointStore::new(&config.checkpoint.path, true).load()
}

#[tokio::test]
async fn test_duplicate_keys_first_occurrence_wins() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), APPLE_BEE, 2, 1);
    let generator = Arc::new(ScriptedGenerator::default());

    let summary = Pipeline::new(&config, generator.clone()).run().await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            attempted: 2,
            succeeded: 2,
            failed: 0
        }
    );
    let results = checkpoint(&config);
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["apple", "bee"]);
    assert_eq!(results.get("apple").unwrap().translation(), Some("苹果"));
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn test_failed_unit_reported_and_left_out() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), APPLE_BEE, 2, 1);
    let generator = Arc::new(ScriptedGenerator::failing(&["bee"]));

    let summary = Pipeline::new(&config, generator).run().await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            attempted: 2,
            succeeded: 1,
            failed: 1
        }
    );
    let results = checkpoint(&config);
    assert_eq!(results.len(), 1);
    assert!(results.contains_key("apple"));
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), "word,translation\nant,蚂蚁\nbee,蜂\ncat,猫\n", 2, 2);

    let first = Arc::new(ScriptedGenerator::default());
    Pipeline::new(&config, first).run().await.unwrap();
    let after_first = checkpoint(&config);

    let second = Arc::new(ScriptedGenerator::default());
    let summary = Pipeline::new(&config, second.clone()).run().await.unwrap();

    assert_eq!(summary, RunSummary::default());
    assert_eq!(second.call_count(), 0);
    assert_eq!(
        checkpoint(&config).keys().collect::<Vec<_>>(),
        after_first.keys().collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_next_run_retries_only_failed_items() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), "word,translation\nant,蚂蚁\nbee,蜂\ncat,猫\n", 3, 1);

    let flaky = Arc::new(ScriptedGenerator::failing(&["bee"]));
    Pipeline::new(&config, flaky).run().await.unwrap();

    let healthy = Arc::new(ScriptedGenerator::default());
    let summary = Pipeline::new(&config, healthy.clone()).run().await.unwrap();

    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(healthy.attempted_words(), vec!["bee".to_string()]);
    assert_eq!(checkpoint(&config).len(), 3);
}

#[tokio::test]
async fn test_failure_count_is_items_in_failed_units() {
    let dir = TempDir::new().unwrap();
    let csv = "word,translation\na1,x\na2,x\na3,x\nb1,x\nb2,x\nb3,x\nc1,x\nc2,x\n";
    let config = test_config(dir.path(), csv, 2, 3);
    let generator = Arc::new(ScriptedGenerator::failing(&["b2"]));

    let summary = Pipeline::new(&config, generator).run().await.unwrap();

    assert_eq!(summary.attempted, 8);
    assert_eq!(summary.failed, 3);
    assert_eq!(summary.succeeded, 5);
    let results = checkpoint(&config);
    for word in ["a1", "a2", "a3", "c1", "c2"] {
        assert!(results.contains_key(word), "missing {}", word);
    }
    for word in ["b1", "b2", "b3"] {
        assert!(!results.contains_key(word), "unexpected {}", word);
    }
}

#[tokio::test]
async fn test_concurrency_ceiling_respected() {
    let dir = TempDir::new().unwrap();
    let csv: String = std::iter::once("word,translation\n".to_string())
        .chain((0..25).map(|i| format!("w{},t\n", i)))
        .collect();
    let config = test_config(dir.path(), &csv, 4, 1);
    let generator = Arc::new(ScriptedGenerator::default());

    let summary = Pipeline::new(&config, generator.clone()).run().await.unwrap();

    assert_eq!(summary.succeeded, 25);
    assert!(generator.peak.load(Ordering::SeqCst) <= 4);
}

#[tokio::test]
async fn test_prefix_selector_limits_work() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), "word,translation\nApple,苹果\nant,蚂蚁\nbee,蜂\n", 2, 1);
    config.source.prefix = Some("A".to_string());
    let generator = Arc::new(ScriptedGenerator::default());

    let summary = Pipeline::new(&config, generator.clone()).run().await.unwrap();

    assert_eq!(summary.attempted, 2);
    let mut words = generator.attempted_words();
    words.sort();
    assert_eq!(words, vec!["Apple".to_string(), "ant".to_string()]);
}

#[tokio::test]
async fn test_interrupted_run_resumes_after_last_flushed_wave() {
    let dir = TempDir::new().unwrap();
    let csv = "word,translation\nant,x\nbee,x\ncat,x\ndog,x\neel,x\nfox,x\n";
    let config = test_config(dir.path(), csv, 2, 1);

    // Wave 1 (ant, bee) completes and is flushed; wave 2 never finishes.
    let stuck = Arc::new(ScriptedGenerator::hanging(&["cat"]));
    let interrupted =
        tokio::time::timeout(Duration::from_millis(300), Pipeline::new(&config, stuck).run()).await;
    assert!(interrupted.is_err());

    let flushed = checkpoint(&config);
    assert_eq!(flushed.keys().collect::<Vec<_>>(), vec!["ant", "bee"]);

    let healthy = Arc::new(ScriptedGenerator::default());
    let summary = Pipeline::new(&config, healthy.clone()).run().await.unwrap();

    assert_eq!(summary.attempted, 4);
    let mut words = healthy.attempted_words();
    words.sort();
    assert_eq!(words, vec!["cat", "dog", "eel", "fox"]);
    assert_eq!(checkpoint(&config).len(), 6);
}

#[tokio::test]
async fn test_missing_column_stops_before_any_call() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), "word,meaning\napple,苹果\n", 2, 1);
    let generator = Arc::new(ScriptedGenerator::default());

    let result = Pipeline::new(&config, generator.clone()).run().await;

    assert!(matches!(result, Err(PipelineError::Source(_))));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_unwritable_checkpoint_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), APPLE_BEE, 2, 1);
    std::fs::write(dir.path().join("not-a-dir"), "").unwrap();
    config.checkpoint.path = dir.path().join("not-a-dir").join("words.json");
    let generator = Arc::new(ScriptedGenerator::default());

    let result = Pipeline::new(&config, generator).run().await;

    assert!(matches!(result, Err(PipelineError::Persistence(_))));
}

#[tokio::test]
async fn test_corrupt_checkpoint_starts_over() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), APPLE_BEE, 2, 1);
    std::fs::create_dir_all(config.checkpoint.path.parent().unwrap()).unwrap();
    std::fs::write(&config.checkpoint.path, "[{\"word\": \"apple\"").unwrap();
    let generator = Arc::new(ScriptedGenerator::default());

    let summary = Pipeline::new(&config, generator).run().await.unwrap();

    assert_eq!(summary.attempted, 2);
    assert_eq!(checkpoint(&config).len(), 2);
}
