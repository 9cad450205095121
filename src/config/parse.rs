use super::types::*;
use crate::config::{expand_env_vars, expand_tilde};
use crate::generation::prompt::PromptTemplate;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("missing credentials: environment variable {0} is not set")]
    MissingCredentials(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_config_with_overrides(path, &Overrides::default())
}

/// Load config, apply command-line overrides, then validate the merged result.
pub fn load_config_with_overrides(path: &Path, overrides: &Overrides) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut config = parse_config_str(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })?;

    overrides.apply(&mut config);
    expand_paths(&mut config);
    load_template_file(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Parse a YAML string into a config without validating it.
pub fn parse_config_str(yaml: &str) -> Result<Config, ConfigError> {
    let yaml = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml)?;
    Ok(serde_yaml::from_str(&yaml)?)
}

/// Read the API key from the environment variable the service config names.
pub fn resolve_api_key(service: &ServiceConfig) -> Result<String, ConfigError> {
    match std::env::var(&service.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ConfigError::MissingCredentials(service.api_key_env.clone())),
    }
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    // Full-line comments may mention `$env{...}` as documentation; only
    // references in actual YAML content must resolve.
    let mut unexpanded_vars: Vec<String> = yaml_string
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(|line| {
            re.captures_iter(line)
                .map(|cap| cap[1].to_string())
                .collect::<Vec<_>>()
        })
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}",
        unexpanded_vars.join(", ")
    )))
}

fn expand_paths(config: &mut Config) {
    config.source.path = expand_tilde(&config.source.path);
    config.checkpoint.path = expand_tilde(&config.checkpoint.path);
    if let Some(path) = config.task.template_path.as_mut() {
        *path = expand_tilde(path);
    }
}

fn load_template_file(config: &mut Config) -> Result<(), ConfigError> {
    if config.task.template.is_some() {
        return Ok(());
    }
    if let Some(path) = &config.task.template_path {
        let template = fs::read_to_string(path).map_err(|e| {
            ConfigError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read prompt template '{}': {}", path.display(), e),
            ))
        })?;
        config.task.template = Some(template);
    }
    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_source(&config.source, &mut errors);
    validate_service(&config.service, &mut errors);
    validate_task(&config.task, &mut errors);

    if config.scheduler.concurrency == 0 {
        errors.push("scheduler.concurrency must be at least 1".to_string());
    }
    if config.scheduler.unit_size == 0 {
        errors.push("scheduler.unit_size must be at least 1".to_string());
    }
    if config.scheduler.unit_size > 1 {
        if let Some(template) = &config.task.template {
            if !PromptTemplate::new(template.clone()).references_unit() {
                errors.push(format!(
                    "scheduler.unit_size is {} but task.template does not reference {{items}}",
                    config.scheduler.unit_size
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_source(source: &SourceConfig, errors: &mut Vec<String>) {
    if source.key_column.trim().is_empty() {
        errors.push("source.key_column cannot be empty".to_string());
    }
    if source.value_column.trim().is_empty() {
        errors.push("source.value_column cannot be empty".to_string());
    }
    if source.key_column.trim().eq_ignore_ascii_case(source.value_column.trim()) {
        errors.push(format!(
            "source.key_column and source.value_column must differ (both '{}')",
            source.key_column
        ));
    }
    if let Some(prefix) = &source.prefix {
        if prefix.is_empty() {
            errors.push("source.prefix cannot be empty".to_string());
        } else if prefix.chars().any(char::is_whitespace) {
            errors.push(format!("source.prefix '{}' cannot contain whitespace", prefix));
        }
    }
}

fn validate_service(service: &ServiceConfig, errors: &mut Vec<String>) {
    if !(service.base_url.starts_with("http://") || service.base_url.starts_with("https://")) {
        errors.push(format!(
            "service.base_url must be an http(s) URL, got '{}'",
            service.base_url
        ));
    }
    if service.model.trim().is_empty() {
        errors.push("service.model cannot be empty".to_string());
    }
    if service.api_key_env.trim().is_empty() {
        errors.push("service.api_key_env cannot be empty".to_string());
    }
    if !(0.0..=2.0).contains(&service.temperature) {
        errors.push(format!(
            "service.temperature must be between 0 and 2, got {}",
            service.temperature
        ));
    }
    if service.timeout.is_zero() {
        errors.push("service.timeout must be greater than zero".to_string());
    }
    if service.retry.max_attempts == 0 {
        errors.push("service.retry.max_attempts must be at least 1".to_string());
    }
}

fn validate_task(task: &TaskConfig, errors: &mut Vec<String>) {
    if task.fields.is_empty() {
        errors.push("task.fields must declare at least one result field".to_string());
    }

    let mut seen = HashSet::new();
    for field in &task.fields {
        if field.trim().is_empty() {
            errors.push("task.fields cannot contain an empty name".to_string());
        } else if field == "word" || field == "translation" {
            errors.push(format!("task.fields: '{}' is reserved for the input item", field));
        } else if !seen.insert(field) {
            errors.push(format!("task.fields: duplicate field '{}'", field));
        }
    }

    match (&task.template, &task.template_path) {
        (None, None) => errors.push("task requires either 'template' or 'template_path'".to_string()),
        (Some(template), _) => {
            if !PromptTemplate::new(template.clone()).references_items() {
                errors.push(
                    "task.template must reference {word}, {translation} or {items}".to_string(),
                );
            }
        }
        (None, Some(_)) => {}
    }
}
