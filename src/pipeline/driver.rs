use super::scheduler::BatchScheduler;
use crate::config::types::{Config, SchedulerConfig};
use crate::generation::Generator;
use crate::source::{ItemSource, Selector, SourceError, WorkItem};
use crate::storage::{CheckpointStore, PersistenceError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input error: {0}")]
    Source(#[from] SourceError),

    #[error("checkpoint error: {0}")]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted={} succeeded={} failed={}",
            self.attempted, self.succeeded, self.failed
        )
    }
}

/// One enrichment run: load, compute the delta against the checkpoint,
/// schedule it, and flush the final result set.
pub struct Pipeline {
    source: ItemSource,
    selector: Selector,
    store: CheckpointStore,
    scheduler: SchedulerConfig,
    generator: Arc<dyn Generator>,
}

impl Pipeline {
    pub fn new(config: &Config, generator: Arc<dyn Generator>) -> Self {
        Self {
            source: ItemSource::new(&config.source),
            selector: Selector::new(config.source.prefix.as_deref()),
            store: CheckpointStore::new(&config.checkpoint.path, config.checkpoint.pretty),
            scheduler: config.scheduler.clone(),
            generator,
        }
    }

    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        // A missing or unreadable checkpoint loads as empty; a bad input
        // file is fatal before any service call is made.
        let mut results = self.store.load();
        let items = self.source.load()?;

        let selected: Vec<WorkItem> = items
            .into_iter()
            .filter(|item| self.selector.matches(item))
            .collect();
        let selected_count = selected.len();
        // The delta is the resume mechanism: anything already in the
        // checkpoint, including results from earlier runs, is never re-sent.
        let delta: Vec<WorkItem> = selected
            .into_iter()
            .filter(|item| !results.contains_key(&item.word))
            .collect();

        info!(
            selected = selected_count,
            already_done = selected_count - delta.len(),
            to_process = delta.len(),
            "Computed work list"
        );

        if delta.is_empty() {
            info!("Nothing to do");
            return Ok(RunSummary::default());
        }

        let scheduler = BatchScheduler::new(
            self.generator.clone(),
            self.store.clone(),
            self.scheduler.clone(),
        );
        let outcome = scheduler.run(&delta, &mut results).await?;

        // Final flush of the complete result set.
        self.store.save(&results).await?;

        let summary = RunSummary {
            attempted: delta.len(),
            succeeded: outcome.succeeded,
            failed: delta.len() - outcome.succeeded,
        };
        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            failed_units = outcome.failed_units,
            waves = outcome.waves,
            total = results.len(),
            path = %self.store.path().display(),
            "Run complete"
        );
        Ok(summary)
    }
}
