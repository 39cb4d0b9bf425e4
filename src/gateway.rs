use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::anthropic;
use crate::config::{Provider, ProviderConfig};
use crate::error::{Error, Result};
use crate::openai;

/// Prompt in, complete text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct ProviderGateway {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl ProviderGateway {
    pub fn new(config: ProviderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("build http client")?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl TextGenerator for ProviderGateway {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self.config.credential()?;
        let provider = self.config.provider;

        tracing::info!(
            %provider,
            model = %self.config.model,
            prompt_chars = prompt.len(),
            "generate"
        );

        let result = match provider {
            Provider::Openai => {
                let endpoint = openai::chat_completions_endpoint(&self.config.base_url);
                openai::chat_completion_text(
                    &self.client,
                    &endpoint,
                    api_key,
                    &self.config.model,
                    prompt,
                    self.config.max_tokens,
                )
                .await
            }
            Provider::Anthropic => {
                let endpoint = anthropic::messages_endpoint(&self.config.base_url);
                anthropic::messages_text(
                    &self.client,
                    &endpoint,
                    api_key,
                    &self.config.model,
                    prompt,
                    self.config.max_tokens,
                )
                .await
            }
        };

        result.map_err(|err| {
            tracing::warn!(%provider, error = %format!("{err:#}"), "generation failed");
            Error::Generation {
                provider,
                message: format!("{err:#}"),
            }
        })
    }
}
