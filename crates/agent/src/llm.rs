//! Chat-completion clients used by the correction suggester.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use intake_core::config::{LlmConfig, LlmProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 200;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    fn provider_name(&self) -> &str;
}

/// Builds the client for the configured provider.
pub fn client_from_config(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    if let Some(reason) = config.unusable_reason() {
        return Err(anyhow!("llm provider `{}` is not usable: {reason}", config.provider.as_str()));
    }

    let timeout = Duration::from_secs(config.timeout_secs);
    let client = match config.provider {
        LlmProvider::OpenAi | LlmProvider::Ollama => {
            let base_url = config.base_url.clone().unwrap_or_else(|| OPENAI_BASE_URL.to_string());
            Box::new(OpenAiCompatibleClient::new(
                base_url,
                config.api_key.clone(),
                &config.model,
                timeout,
            )?) as Box<dyn LlmClient>
        }
        LlmProvider::Anthropic => {
            let base_url =
                config.base_url.clone().unwrap_or_else(|| ANTHROPIC_BASE_URL.to_string());
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| anyhow!("llm.api_key is required for anthropic"))?;
            Box::new(AnthropicClient::new(base_url, api_key, &config.model, timeout)?)
        }
    };

    Ok(client)
}

/// Chat-completions API as served by OpenAI and Ollama's `/v1` endpoint.
pub struct OpenAiCompatibleClient {
    base_url: String,
    api_key: Option<SecretString>,
    client: reqwest::Client,
    model: String,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: String,
        api_key: Option<SecretString>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "model": &self.model,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": user_prompt}
                ],
                "temperature": 0.0,
                "max_tokens": MAX_TOKENS
            }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat completion error {status}: {body}"));
        }

        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = response.json().await?;
        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat completion returned no choices"))
    }

    fn provider_name(&self) -> &str {
        "openai-compatible"
    }
}

pub struct AnthropicClient {
    base_url: String,
    api_key: SecretString,
    client: reqwest::Client,
    model: String,
}

impl AnthropicClient {
    pub fn new(
        base_url: String,
        api_key: SecretString,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "model": &self.model,
                "max_tokens": MAX_TOKENS,
                "system": system_prompt,
                "messages": [{"role": "user", "content": user_prompt}]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Anthropic API error {status}: {body}"));
        }

        #[derive(Deserialize)]
        struct ContentBlock {
            text: Option<String>,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            content: Vec<ContentBlock>,
        }

        let api_response: ApiResponse = response.json().await?;
        api_response
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| anyhow!("empty response from Anthropic"))
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use intake_core::config::{AppConfig, LlmProvider};

    use super::client_from_config;

    #[test]
    fn unusable_settings_do_not_build_a_client() {
        let config = AppConfig::default();
        let error = client_from_config(&config.llm).err().map(|error| error.to_string());
        assert!(error.is_some_and(|message| message.contains("llm.api_key")));
    }

    #[test]
    fn provider_selects_the_wire_format() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Ollama;
        config.llm.base_url = Some("http://localhost:11434/v1".to_string());
        let ollama = client_from_config(&config.llm).expect("ollama client");
        assert_eq!(ollama.provider_name(), "openai-compatible");

        config.llm.provider = LlmProvider::Anthropic;
        config.llm.base_url = None;
        config.llm.api_key = Some("sk-ant-test".to_string().into());
        let anthropic = client_from_config(&config.llm).expect("anthropic client");
        assert_eq!(anthropic.provider_name(), "anthropic");
    }
}
