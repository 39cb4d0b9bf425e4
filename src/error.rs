use thiserror::Error;

use crate::config::Provider;
use crate::wizard::Step;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot use {provider}: API key not configured (set {env_var})")]
    Configuration {
        provider: Provider,
        env_var: &'static str,
    },
    #[error("error calling {provider} API: {message}")]
    Generation { provider: Provider, message: String },
    #[error("could not parse the book outline returned by the provider: {source}")]
    Parse {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Validation(String),
    #[error("step `{step}` is not available yet: {reason}")]
    StepLocked { step: Step, reason: &'static str },
    #[error("no book outline yet; generate or load one first")]
    NoOutline,
    #[error("chapter {0} does not exist in the outline")]
    UnknownChapter(u32),
    #[error("chapter {0} has no generated content")]
    ChapterNotGenerated(u32),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Provider output kept for manual inspection when the outline could not be parsed.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
