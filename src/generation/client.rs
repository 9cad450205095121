use super::decode::decode_unit;
use super::prompt::PromptTemplate;
use super::{GenerationFailure, Generator};
use crate::config::types::{RetryConfig, ServiceConfig, TaskConfig};
use crate::config::ConfigError;
use crate::source::WorkUnit;
use crate::storage::GenerationResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug)]
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    json_mode: bool,
    system: Option<String>,
    template: PromptTemplate,
    fields: Vec<String>,
    retry: RetryConfig,
}

impl ChatClient {
    pub fn new(service: &ServiceConfig, task: &TaskConfig, api_key: String) -> Result<Self, ConfigError> {
        let template = task
            .template
            .clone()
            .ok_or_else(|| ConfigError::Validation("task template was not loaded".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(service.timeout)
            .build()
            .map_err(|e| ConfigError::Validation(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", service.base_url.trim_end_matches('/')),
            api_key,
            model: service.model.clone(),
            temperature: service.temperature,
            json_mode: service.json_mode,
            system: task.system.clone(),
            template: PromptTemplate::new(template),
            fields: task.fields.clone(),
            retry: service.retry.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            response_format: self.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        }
    }

    /// Send one request and return the assistant message content.
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, GenerationFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.trim())
            .json(request)
            .send()
            .await
            .map_err(classify_transport)?;

        if !response.status().is_success() {
            return Err(GenerationFailure::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationFailure::Timeout
            } else {
                GenerationFailure::Malformed(format!("invalid completion body: {}", e))
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationFailure::EmptyResponse)
    }

    /// Retry transient failures with exponential backoff, up to `max_attempts` in total.
    async fn with_retry<F, Fut, T>(&self, unit: &WorkUnit, mut operation: F) -> Result<T, GenerationFailure>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, GenerationFailure>>,
    {
        let mut attempts = 0;
        let mut backoff = clamp_backoff(self.retry.backoff);

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.retry.max_attempts || !e.is_transient() {
                        return Err(e);
                    }

                    warn!(
                        unit = unit.index(),
                        attempt = attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Generation request failed, retrying"
                    );

                    tokio::time::sleep(backoff).await;
                    backoff = clamp_backoff(backoff.saturating_mul(2));
                }
            }
        }
    }
}

/// Bound a backoff delay by [`MAX_BACKOFF`].
fn clamp_backoff(backoff: Duration) -> Duration {
    backoff.min(MAX_BACKOFF)
}

fn classify_transport(e: reqwest::Error) -> GenerationFailure {
    if e.is_timeout() {
        GenerationFailure::Timeout
    } else {
        GenerationFailure::Transport(e)
    }
}

#[async_trait]
impl Generator for ChatClient {
    async fn generate(&self, unit: &WorkUnit) -> Result<Vec<GenerationResult>, GenerationFailure> {
        let prompt = self.template.render(unit);
        let request = self.build_request(&prompt);

        debug!(unit = unit.index(), words = ?unit.words(), "Requesting generation");
        let content = self.with_retry(unit, || self.complete(&request)).await?;
        decode_unit(&content, unit, &self.fields)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ServiceConfig {
        ServiceConfig {
            base_url: "https://llm.example.com/v1/".to_string(),
            model: "glm-4".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(5),
            json_mode: true,
            retry: RetryConfig::default(),
        }
    }

    fn task() -> TaskConfig {
        TaskConfig {
            system: Some("Reply with JSON only.".to_string()),
            template: Some("Simplify: {items}".to_string()),
            template_path: None,
            fields: vec!["pos".to_string(), "meaning".to_string()],
        }
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = ChatClient::new(&service(), &task(), "sk-test".to_string()).unwrap();
        assert_eq!(client.endpoint(), "https://llm.example.com/v1/chat/completions");
    }

    #[test]
    fn test_request_shape() {
        let client = ChatClient::new(&service(), &task(), "sk-test".to_string()).unwrap();
        let request = client.build_request("Simplify: []");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "glm-4");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Simplify: []");
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_request_without_system_or_json_mode() {
        let mut service = service();
        service.json_mode = false;
        let mut task = task();
        task.system = None;

        let client = ChatClient::new(&service, &task, "sk-test".to_string()).unwrap();
        let json = serde_json::to_value(client.build_request("hi")).unwrap();

        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert!(json.get("response_format").is_none());
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(clamp_backoff(Duration::from_secs(2)), Duration::from_secs(2));
        assert_eq!(clamp_backoff(Duration::from_secs(3600)), MAX_BACKOFF);
        assert_eq!(clamp_backoff(Duration::MAX.saturating_mul(2)), MAX_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_configured_backoff_does_not_overflow() {
        let mut service = service();
        service.retry = RetryConfig {
            max_attempts: 2,
            backoff: Duration::MAX,
        };
        let client = ChatClient::new(&service, &task(), "sk-test".to_string()).unwrap();
        let unit = WorkUnit::new(0, vec![crate::source::WorkItem::new("apple", "苹果")]).unwrap();

        let mut calls = 0;
        let result: Result<(), GenerationFailure> = client
            .with_retry(&unit, || {
                calls += 1;
                async { Err(GenerationFailure::Timeout) }
            })
            .await;

        assert!(matches!(result, Err(GenerationFailure::Timeout)));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_missing_template_rejected() {
        let mut task = task();
        task.template = None;
        assert!(ChatClient::new(&service(), &task, "sk-test".to_string()).is_err());
    }
}
