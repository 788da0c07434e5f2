//! Configuration for the LLM behind SQL generation

use crate::nl_sql::error::{NlSqlError, NlSqlResult};
use serde::{Deserialize, Serialize};
use std::env;

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    #[default]
    Azure,
    OpenAI,
    Anthropic,
}

/// Configuration for the chat-completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProviderType,

    // === Azure OpenAI ===
    /// Resource endpoint (or AZURE_OPENAI_ENDPOINT)
    pub azure_endpoint: Option<String>,

    /// API key (or AZURE_OPENAI_KEY)
    pub azure_api_key: Option<String>,

    /// Deployment name (or AZURE_DEPLOYMENT_NAME)
    pub azure_deployment: Option<String>,

    pub azure_api_version: String,

    // === OpenAI ===
    /// OpenAI API key (or OPENAI_API_KEY)
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,

    // === Anthropic ===
    /// Anthropic API key (or ANTHROPIC_API_KEY)
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub anthropic_base_url: String,

    // === Generation Parameters ===
    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Maximum tokens the model may produce
    pub max_tokens: u32,

    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderType::Azure,

            azure_endpoint: None,
            azure_api_key: None,
            azure_deployment: None,
            azure_api_version: "2023-12-01-preview".to_string(),

            openai_api_key: None,
            openai_model: "gpt-4o".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),

            anthropic_api_key: None,
            anthropic_model: "claude-sonnet-4-5-20250929".to_string(),
            anthropic_base_url: "https://api.anthropic.com".to_string(),

            temperature: 0.0,
            max_tokens: 256,
            timeout_seconds: 60,
        }
    }
}

/// Config value if set and non-empty, else the environment variable
fn configured_or_env(value: &Option<String>, var: &str) -> Option<String> {
    value
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| env::var(var).ok().filter(|v| !v.trim().is_empty()))
}

impl LlmConfig {
    pub fn get_azure_endpoint(&self) -> Option<String> {
        configured_or_env(&self.azure_endpoint, "AZURE_OPENAI_ENDPOINT")
    }

    pub fn get_azure_api_key(&self) -> Option<String> {
        configured_or_env(&self.azure_api_key, "AZURE_OPENAI_KEY")
    }

    pub fn get_azure_deployment(&self) -> Option<String> {
        configured_or_env(&self.azure_deployment, "AZURE_DEPLOYMENT_NAME")
    }

    pub fn get_openai_api_key(&self) -> Option<String> {
        configured_or_env(&self.openai_api_key, "OPENAI_API_KEY")
    }

    pub fn get_anthropic_api_key(&self) -> Option<String> {
        configured_or_env(&self.anthropic_api_key, "ANTHROPIC_API_KEY")
    }

    /// Validate configuration
    pub fn validate(&self) -> NlSqlResult<()> {
        match self.provider {
            LlmProviderType::Azure => {
                if self.get_azure_endpoint().is_none() {
                    return Err(NlSqlError::ConfigurationError(
                        "Azure OpenAI endpoint not found. Set AZURE_OPENAI_ENDPOINT or llm.azure_endpoint"
                            .to_string(),
                    ));
                }
                if self.get_azure_api_key().is_none() {
                    return Err(NlSqlError::ConfigurationError(
                        "Azure OpenAI key not found. Set AZURE_OPENAI_KEY or llm.azure_api_key"
                            .to_string(),
                    ));
                }
                if self.get_azure_deployment().is_none() {
                    return Err(NlSqlError::ConfigurationError(
                        "Azure deployment not found. Set AZURE_DEPLOYMENT_NAME or llm.azure_deployment"
                            .to_string(),
                    ));
                }
            }
            LlmProviderType::OpenAI => {
                if self.get_openai_api_key().is_none() {
                    return Err(NlSqlError::ConfigurationError(
                        "OpenAI API key not found. Set OPENAI_API_KEY or llm.openai_api_key"
                            .to_string(),
                    ));
                }
            }
            LlmProviderType::Anthropic => {
                if self.get_anthropic_api_key().is_none() {
                    return Err(NlSqlError::ConfigurationError(
                        "Anthropic API key not found. Set ANTHROPIC_API_KEY or llm.anthropic_api_key"
                            .to_string(),
                    ));
                }
            }
        }

        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(NlSqlError::ConfigurationError(
                "temperature must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(NlSqlError::ConfigurationError(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(NlSqlError::ConfigurationError(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai_config() -> LlmConfig {
        LlmConfig {
            provider: LlmProviderType::OpenAI,
            openai_api_key: Some("test-key".to_string()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, LlmProviderType::Azure);
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.azure_api_version, "2023-12-01-preview");
    }

    #[test]
    fn test_validation() {
        let mut config = openai_config();
        assert!(config.validate().is_ok());

        config.temperature = 2.0;
        assert!(matches!(
            config.validate(),
            Err(NlSqlError::ConfigurationError(_))
        ));

        config.temperature = 0.0;
        config.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_configured_value_wins_over_environment() {
        let config = openai_config();
        assert_eq!(config.get_openai_api_key().as_deref(), Some("test-key"));
    }

    #[test]
    fn test_blank_configured_value_is_ignored() {
        assert_eq!(
            configured_or_env(&Some("  ".to_string()), "NLSQL_TEST_UNSET_VARIABLE"),
            None
        );
    }

    #[test]
    fn test_parse_from_toml() {
        let config: LlmConfig = toml::from_str(
            r#"
            provider = "anthropic"
            anthropic_api_key = "k"
            max_tokens = 512
            "#,
        )
        .unwrap();
        assert_eq!(config.provider, LlmProviderType::Anthropic);
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.temperature, 0.0);
    }
}
