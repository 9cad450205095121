use crate::config::types::SchedulerConfig;
use crate::generation::{GenerationFailure, Generator};
use crate::source::{partition, WorkItem, WorkUnit};
use crate::storage::{CheckpointResultSet, CheckpointStore, GenerationResult, PersistenceError};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Totals for one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub units: usize,
    pub failed_units: usize,
    pub succeeded: usize,
    pub waves: usize,
}

struct UnitOutcome {
    index: usize,
    len: usize,
    result: Result<Vec<GenerationResult>, GenerationFailure>,
}

/// Drives work units through a [`Generator`] in waves of at most
/// `concurrency` units, persisting the result set after every wave.
pub struct BatchScheduler {
    generator: Arc<dyn Generator>,
    store: CheckpointStore,
    config: SchedulerConfig,
}

impl BatchScheduler {
    pub fn new(generator: Arc<dyn Generator>, store: CheckpointStore, config: SchedulerConfig) -> Self {
        Self {
            generator,
            store,
            config,
        }
    }

    /// Process `items` and merge their results into `results`.
    ///
    /// Failed units are counted and skipped. A failed checkpoint write stops
    /// the run; everything flushed before it stays on disk.
    pub async fn run(
        &self,
        items: &[WorkItem],
        results: &mut CheckpointResultSet,
    ) -> Result<ScheduleOutcome, PersistenceError> {
        let concurrency = self.config.concurrency.max(1);
        let mut pending: VecDeque<WorkUnit> = partition(items, self.config.unit_size).into();
        let mut outcome = ScheduleOutcome {
            units: pending.len(),
            ..Default::default()
        };

        info!(
            items = items.len(),
            units = outcome.units,
            concurrency,
            unit_size = self.config.unit_size,
            "Starting scheduler"
        );

        // Results of the current wave. Only the scheduler touches it; tasks
        // hand their output back through the JoinSet.
        let mut buffer: Vec<GenerationResult> = Vec::new();

        while !pending.is_empty() {
            // A wave admits up to `concurrency` units in partition order and
            // waits for all of them, so at most that many calls are in flight.
            let admitted = concurrency.min(pending.len());
            let mut in_flight: JoinSet<UnitOutcome> = JoinSet::new();

            for unit in pending.drain(..admitted) {
                let generator = self.generator.clone();
                in_flight.spawn(async move {
                    let result = generator.generate(&unit).await;
                    UnitOutcome {
                        index: unit.index(),
                        len: unit.len(),
                        result,
                    }
                });
            }

            // Completion order is arbitrary; merging is keyed, so the
            // resulting set does not depend on it.
            while let Some(joined) = in_flight.join_next().await {
                match joined {
                    Ok(UnitOutcome {
                        index,
                        len,
                        result: Ok(unit_results),
                    }) => {
                        debug!(unit = index, items = len, results = unit_results.len(), "Unit completed");
                        buffer.extend(unit_results);
                    }
                    Ok(UnitOutcome {
                        index,
                        len,
                        result: Err(e),
                    }) => {
                        warn!(unit = index, items = len, error = %e, "Unit failed");
                        outcome.failed_units += 1;
                    }
                    Err(e) => {
                        // The task panicked or was cancelled. Its items stay
                        // out of the checkpoint and are retried next run.
                        error!(error = %e, "Unit task aborted");
                        outcome.failed_units += 1;
                    }
                }
            }

            // Flush point: every unit of the wave has finished. A failed
            // write aborts the run so completed work is never reported
            // without being on disk.
            outcome.waves += 1;
            let added = results.merge(buffer.drain(..));
            outcome.succeeded += added;

            self.store.save(results).await?;
            info!(
                wave = outcome.waves,
                units = admitted,
                added,
                remaining_units = pending.len(),
                total = results.len(),
                "Wave flushed"
            );

            if !pending.is_empty() {
                if let Some(delay) = self.config.wave_delay {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Ok(outcome)
    }
}
