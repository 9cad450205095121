use clap::{Parser, Subcommand};
use lexifill::config::{resolve_config_path, Overrides};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lexifill")]
#[command(about = "Resumable vocabulary enrichment with a text-generation API", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich the words that are not in the checkpoint yet
    Run {
        /// Input CSV file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Checkpoint / output JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only attempt words starting with this prefix
        #[arg(short, long)]
        prefix: Option<String>,

        /// Maximum concurrent requests
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Items per request
        #[arg(short, long)]
        unit_size: Option<usize>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Combine several checkpoint files into one
    Merge {
        #[arg(short, long)]
        output: PathBuf,

        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lexifill=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run {
            input,
            output,
            prefix,
            concurrency,
            unit_size,
        }) => {
            let overrides = Overrides {
                input,
                output,
                prefix,
                concurrency,
                unit_size,
            };
            lexifill::cli::run::run(config_path, overrides).await?;
        }
        None => {
            lexifill::cli::run::run(config_path, Overrides::default()).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                lexifill::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                lexifill::cli::config::validate(config_path)?;
            }
        },
        Some(Commands::Merge { output, inputs }) => {
            let merged = lexifill::cli::merge::merge(&inputs, &output)?;
            println!("merged={} output={}", merged.len(), output.display());
        }
    }

    Ok(())
}
