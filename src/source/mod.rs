pub mod reader;
pub mod unit;

pub use reader::{normalize_key, ItemSource, Selector, SourceError, WorkItem};
pub use unit::{partition, WorkUnit};
