pub mod cli;
pub mod config;
pub mod generation;
pub mod pipeline;
pub mod source;
pub mod storage;
