use std::fmt;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cli::ProviderArgs;
use crate::error::{Error, Result};

pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    Openai,
    Anthropic,
}

impl Provider {
    pub fn env_var(self) -> &'static str {
        match self {
            Provider::Openai => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn models(self) -> &'static [&'static str] {
        match self {
            Provider::Openai => &["gpt-4o", "gpt-4-turbo-preview", "gpt-4"],
            Provider::Anthropic => &[
                "claude-3-5-sonnet-20241022",
                "claude-3-opus-20240229",
                "claude-3-sonnet-20240229",
            ],
        }
    }

    pub fn default_model(self) -> &'static str {
        self.models()[0]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Openai => f.write_str("OpenAI"),
            Provider::Anthropic => f.write_str("Anthropic"),
        }
    }
}

/// Everything needed to call one provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn credential(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or(Error::Configuration {
            provider: self.provider,
            env_var: self.provider.env_var(),
        })
    }
}

/// Both backends plus which one is selected.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub selected: Provider,
    pub openai: ProviderConfig,
    pub anthropic: ProviderConfig,
}

impl ProviderSettings {
    pub fn from_args(args: &ProviderArgs) -> anyhow::Result<Self> {
        let openai_base_url =
            validate_base_url(&args.openai_base_url).context("validate --openai-base-url")?;
        let anthropic_base_url =
            validate_base_url(&args.anthropic_base_url).context("validate --anthropic-base-url")?;

        let mut settings = Self {
            selected: args.provider,
            openai: ProviderConfig {
                provider: Provider::Openai,
                model: Provider::Openai.default_model().to_owned(),
                base_url: openai_base_url,
                api_key: api_key_from_env(Provider::Openai),
                max_tokens: args.max_tokens,
                timeout_secs: args.timeout_secs,
            },
            anthropic: ProviderConfig {
                provider: Provider::Anthropic,
                model: Provider::Anthropic.default_model().to_owned(),
                base_url: anthropic_base_url,
                api_key: api_key_from_env(Provider::Anthropic),
                max_tokens: args.max_tokens,
                timeout_secs: args.timeout_secs,
            },
        };
        if let Some(model) = args.model.as_deref() {
            settings.config_mut(args.provider).model = model.to_owned();
        }
        Ok(settings)
    }

    pub fn config(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Openai => &self.openai,
            Provider::Anthropic => &self.anthropic,
        }
    }

    pub fn config_mut(&mut self, provider: Provider) -> &mut ProviderConfig {
        match provider {
            Provider::Openai => &mut self.openai,
            Provider::Anthropic => &mut self.anthropic,
        }
    }

    pub fn active(&self) -> &ProviderConfig {
        self.config(self.selected)
    }

    /// Selects `provider` with `model`, refusing when its credential is missing.
    pub fn select(&mut self, provider: Provider, model: &str) -> Result<()> {
        if model.trim().is_empty() {
            return Err(Error::validation("model must not be empty"));
        }
        self.config(provider).credential()?;
        if !provider.models().contains(&model) {
            tracing::warn!(%provider, model, "model is not in the known model list");
        }
        self.config_mut(provider).model = model.to_owned();
        self.selected = provider;
        Ok(())
    }
}

fn api_key_from_env(provider: Provider) -> Option<String> {
    std::env::var(provider.env_var())
        .ok()
        .map(|key| key.trim().to_owned())
        .filter(|key| !key.is_empty())
}

fn validate_base_url(raw: &str) -> anyhow::Result<String> {
    let url = Url::parse(raw).with_context(|| format!("parse base url: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("base url must be http/https: {raw}");
    }
    Ok(raw.trim_end_matches('/').to_owned())
}
