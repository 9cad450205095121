use crate::config::{load_config_with_overrides, resolve_api_key, ConfigError, Overrides};
use crate::generation::ChatClient;
use crate::pipeline::{Pipeline, PipelineError, RunSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

pub async fn run(
    config_path: Option<PathBuf>,
    overrides: Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/lexifill/config.yml");
            eprintln!("  /etc/lexifill/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'lexifill config init' to generate one.");
            std::process::exit(1);
        }
    };

    let summary = run_enrichment(&config_path, &overrides).await?;
    println!("{}", summary);
    Ok(())
}

async fn run_enrichment(config_path: &Path, overrides: &Overrides) -> Result<RunSummary, RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config_with_overrides(config_path, overrides)?;

    let api_key = resolve_api_key(&config.service)?;
    let client = ChatClient::new(&config.service, &config.task, api_key)?;
    info!(
        endpoint = client.endpoint(),
        model = %config.service.model,
        input = %config.source.path.display(),
        checkpoint = %config.checkpoint.path.display(),
        prefix = config.source.prefix.as_deref().unwrap_or("*"),
        "Starting enrichment run"
    );

    let pipeline = Pipeline::new(&config, Arc::new(client));
    Ok(pipeline.run().await?)
}
