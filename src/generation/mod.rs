//! Calls to the external text-generation service.
//!
//! A [`Generator`] turns one [`WorkUnit`] into validated results or a
//! [`GenerationFailure`]. Failures never escape as errors of the run; the
//! scheduler counts them and moves on.

pub mod client;
pub mod decode;
pub mod prompt;

use crate::source::WorkUnit;
use crate::storage::GenerationResult;
use async_trait::async_trait;
use thiserror::Error;

pub use client::ChatClient;
pub use prompt::PromptTemplate;

#[derive(Debug, Error)]
pub enum GenerationFailure {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("timed out waiting for the generation service")]
    Timeout,

    #[error("generation service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation service returned an empty response")]
    EmptyResponse,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("response failed validation: {0}")]
    Validation(String),
}

impl GenerationFailure {
    /// Failures worth another attempt within the same run.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationFailure::Transport(_) | GenerationFailure::Timeout => true,
            GenerationFailure::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, unit: &WorkUnit) -> Result<Vec<GenerationResult>, GenerationFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GenerationFailure::Timeout.is_transient());
        assert!(GenerationFailure::Status { status: 429, body: String::new() }.is_transient());
        assert!(GenerationFailure::Status { status: 502, body: String::new() }.is_transient());
        assert!(!GenerationFailure::Status { status: 401, body: String::new() }.is_transient());
        assert!(!GenerationFailure::EmptyResponse.is_transient());
        assert!(!GenerationFailure::Malformed("x".into()).is_transient());
    }
}
