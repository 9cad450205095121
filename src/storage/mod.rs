pub mod checkpoint;

pub use checkpoint::{
    write_result_set, CheckpointResultSet, CheckpointStore, GenerationResult, PersistenceError,
};
