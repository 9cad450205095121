use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub checkpoint: CheckpointConfig,
    pub service: ServiceConfig,
    pub task: TaskConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    #[serde(default = "default_key_column")]
    pub key_column: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
    /// Only items whose key starts with this prefix (case-insensitive) are attempted.
    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_key_column() -> String {
    "word".to_string()
}

fn default_value_column() -> String {
    "translation".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub path: PathBuf,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_pretty() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Ask the service for `response_format: {"type": "json_object"}`.
    #[serde(default)]
    pub json_mode: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per unit, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff", with = "humantime_serde")]
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: default_backoff(),
        }
    }
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff() -> Duration {
    Duration::from_secs(2)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub template_path: Option<PathBuf>,
    /// Fields every generated entry must carry with a non-empty value.
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_unit_size")]
    pub unit_size: usize,
    #[serde(default, with = "humantime_serde")]
    pub wave_delay: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            unit_size: default_unit_size(),
            wave_delay: None,
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_unit_size() -> usize {
    1
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub prefix: Option<String>,
    pub concurrency: Option<usize>,
    pub unit_size: Option<usize>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(input) = &self.input {
            config.source.path = input.clone();
        }
        if let Some(output) = &self.output {
            config.checkpoint.path = output.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.source.prefix = Some(prefix.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.scheduler.concurrency = concurrency;
        }
        if let Some(unit_size) = self.unit_size {
            config.scheduler.unit_size = unit_size;
        }
    }
}
