//! LLM provider client implementations

use crate::nl_sql::config::{LlmConfig, LlmProviderType};
use crate::nl_sql::error::{NlSqlError, NlSqlResult};
use crate::nl_sql::prompt::{ChatMessage, Role};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Trait for chat-completion providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send the messages and return the raw text of the first completion
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> NlSqlResult<String>;

    /// Get provider name
    fn name(&self) -> &str;
}

fn http_client(timeout_seconds: u64) -> NlSqlResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| NlSqlError::NetworkError(format!("Failed to create HTTP client: {}", e)))
}

/// Send a request and decode a JSON body, mapping non-2xx statuses to `ApiError`
async fn send_json<T: for<'de> Deserialize<'de>>(request: RequestBuilder) -> NlSqlResult<T> {
    let response = request
        .send()
        .await
        .map_err(|e| NlSqlError::NetworkError(format!("Request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(NlSqlError::ApiError {
            status_code: status.as_u16(),
            message: error_text,
        });
    }

    response
        .json()
        .await
        .map_err(|e| NlSqlError::ProviderError(format!("Failed to parse API response: {}", e)))
}

// Chat Completions API types, shared by Azure OpenAI and OpenAI
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    fn into_text(self) -> NlSqlResult<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| NlSqlError::ProviderError("No content in response".to_string()))
    }
}

/// Azure OpenAI deployment
pub struct AzureOpenAiProvider {
    client: Client,
    api_key: String,
    url: String,
}

impl AzureOpenAiProvider {
    pub fn new(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        api_key: String,
        timeout_seconds: u64,
    ) -> NlSqlResult<Self> {
        Ok(Self {
            client: http_client(timeout_seconds)?,
            api_key,
            url: Self::completions_url(endpoint, deployment, api_version),
        })
    }

    fn completions_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            api_version
        )
    }
}

#[async_trait]
impl LlmProvider for AzureOpenAiProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> NlSqlResult<String> {
        debug!(
            "Calling Azure OpenAI at {}, max_tokens: {}, temperature: {}",
            self.url, max_tokens, temperature
        );

        let request_body = ChatCompletionRequest {
            model: None,
            messages,
            temperature,
            max_tokens,
        };
        let response: ChatCompletionResponse = send_json(
            self.client
                .post(&self.url)
                .header("api-key", &self.api_key)
                .json(&request_body),
        )
        .await?;

        response.into_text()
    }

    fn name(&self) -> &str {
        "Azure OpenAI"
    }
}

/// OpenAI-compatible chat completions endpoint
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout_seconds: u64,
    ) -> NlSqlResult<Self> {
        Ok(Self {
            client: http_client(timeout_seconds)?,
            api_key,
            base_url,
            model,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> NlSqlResult<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(
            "Calling OpenAI API with model: {}, max_tokens: {}, temperature: {}",
            self.model, max_tokens, temperature
        );

        let request_body = ChatCompletionRequest {
            model: Some(&self.model),
            messages,
            temperature,
            max_tokens,
        };
        let response: ChatCompletionResponse = send_json(
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request_body),
        )
        .await?;

        response.into_text()
    }

    fn name(&self) -> &str {
        "OpenAI"
    }
}

/// Anthropic Messages API
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout_seconds: u64,
    ) -> NlSqlResult<Self> {
        Ok(Self {
            client: http_client(timeout_seconds)?,
            api_key,
            base_url,
            model,
        })
    }

    /// The Messages API takes system text separately from the turns
    fn build_request(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> AnthropicRequest {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens,
            temperature,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned()
                .collect(),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> NlSqlResult<String> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        debug!(
            "Calling Anthropic API with model: {}, max_tokens: {}, temperature: {}",
            self.model, max_tokens, temperature
        );

        let request_body = self.build_request(messages, temperature, max_tokens);
        let response: AnthropicResponse = send_json(
            self.client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&request_body),
        )
        .await?;

        response
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| NlSqlError::ProviderError("No content in response".to_string()))
    }

    fn name(&self) -> &str {
        "Anthropic Claude"
    }
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

fn missing(what: &str) -> NlSqlError {
    NlSqlError::ConfigurationError(format!("{what} not configured"))
}

/// Create LLM client based on configuration
pub fn create_llm_client(config: &LlmConfig) -> NlSqlResult<Arc<dyn LlmProvider>> {
    config.validate()?;

    match config.provider {
        LlmProviderType::Azure => {
            let endpoint = config
                .get_azure_endpoint()
                .ok_or_else(|| missing("Azure OpenAI endpoint"))?;
            let deployment = config
                .get_azure_deployment()
                .ok_or_else(|| missing("Azure deployment"))?;
            let api_key = config
                .get_azure_api_key()
                .ok_or_else(|| missing("Azure OpenAI key"))?;

            Ok(Arc::new(AzureOpenAiProvider::new(
                &endpoint,
                &deployment,
                &config.azure_api_version,
                api_key,
                config.timeout_seconds,
            )?))
        }
        LlmProviderType::OpenAI => {
            let api_key = config
                .get_openai_api_key()
                .ok_or_else(|| missing("OpenAI API key"))?;

            Ok(Arc::new(OpenAiProvider::new(
                api_key,
                config.openai_base_url.clone(),
                config.openai_model.clone(),
                config.timeout_seconds,
            )?))
        }
        LlmProviderType::Anthropic => {
            let api_key = config
                .get_anthropic_api_key()
                .ok_or_else(|| missing("Anthropic API key"))?;

            Ok(Arc::new(AnthropicProvider::new(
                api_key,
                config.anthropic_base_url.clone(),
                config.anthropic_model.clone(),
                config.timeout_seconds,
            )?))
        }
    }
}
