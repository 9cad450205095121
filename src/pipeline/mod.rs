pub mod driver;
pub mod scheduler;

pub use driver::{Pipeline, PipelineError, RunSummary};
pub use scheduler::{BatchScheduler, ScheduleOutcome};
