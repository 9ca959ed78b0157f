use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_PROVIDER: &str = "google";
pub const DEFAULT_BIND: &str = "127.0.0.1:8501";
pub const DEFAULT_TITLE: &str = "AI Assistant";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful and precise assistant.";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default model (optional)
    pub model: Option<String>,

    /// Provider identifier ("google" or "stub").
    pub provider: Option<String>,

    /// Instruction sent with every turn of every session.
    pub system_instruction: Option<String>,

    /// Page heading and window title.
    pub title: Option<String>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub google: GoogleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    /// Listen address, e.g. "0.0.0.0:8501".
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GoogleConfig {
    /// Override for the Generative Language API base URL.
    pub api_base: Option<String>,

    /// Sampling temperature; the API default applies when unset.
    pub temperature: Option<f64>,

    /// Let the model search the web and cite its sources.
    #[serde(default)]
    pub grounding: bool,
}

impl Config {
    /// A missing file is not an error; a malformed one is.
    pub fn load_optional(path: &Path) -> anyhow::Result<Option<Self>> {
        let text = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            read => read.with_context(|| format!("cannot read {}", path.display()))?,
        };
        toml::from_str(&text)
            .map(Some)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Settings after applying CLI overrides, the config file and defaults, in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub model: String,
    pub provider: String,
    pub system_instruction: String,
    pub title: String,
    pub bind: String,
    pub api_base: Option<String>,
    pub temperature: Option<f64>,
    pub grounding: bool,
}

impl Settings {
    pub fn resolve(
        cfg: Option<&Config>,
        model: Option<String>,
        provider: Option<String>,
        bind: Option<String>,
    ) -> Self {
        let model = model
            .or_else(|| cfg.and_then(|c| c.model.clone()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let provider = provider
            .or_else(|| cfg.and_then(|c| c.provider.clone()))
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());

        let system_instruction = cfg
            .and_then(|c| c.system_instruction.clone())
            .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string());

        let title = cfg
            .and_then(|c| c.title.clone())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let bind = bind
            .or_else(|| cfg.and_then(|c| c.server.bind.clone()))
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        Self {
            model,
            provider,
            system_instruction,
            title,
            bind,
            api_base: cfg.and_then(|c| c.google.api_base.clone()),
            temperature: cfg.and_then(|c| c.google.temperature),
            grounding: cfg.is_some_and(|c| c.google.grounding),
        }
    }
}
