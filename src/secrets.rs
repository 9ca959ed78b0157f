use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};

pub const API_KEY_NAME: &str = "GOOGLE_API_KEY";

const API_KEY_ENV: [&str; 2] = [API_KEY_NAME, "GEMINI_API_KEY"];

/// `secrets.toml`: a flat table of string values, e.g. `GOOGLE_API_KEY = "..."`.
#[derive(Debug, Clone)]
pub struct SecretStore {
    path: PathBuf,
}

impl SecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up one key. A missing file is the same as a missing key.
    pub fn lookup(&self, name: &str) -> anyhow::Result<Option<String>> {
        let s = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow!(e))
                    .with_context(|| format!("failed to read secrets: {}", self.path.display()))
            }
        };

        let table: toml::Table = toml::from_str(&s)
            .with_context(|| format!("failed to parse secrets: {}", self.path.display()))?;

        match table.get(name) {
            None => Ok(None),
            Some(toml::Value::String(v)) => Ok(Some(v.clone())),
            Some(_) => Err(anyhow!(
                "secret {name} in {} is not a string",
                self.path.display()
            )),
        }
    }
}

/// Resolve the API key from the process environment or `store`.
pub fn resolve_api_key(store: &SecretStore) -> anyhow::Result<String> {
    resolve_api_key_with(|name| std::env::var(name).ok(), store)
}

pub fn resolve_api_key_with(
    env: impl Fn(&str) -> Option<String>,
    store: &SecretStore,
) -> anyhow::Result<String> {
    for name in API_KEY_ENV {
        if let Some(key) = env(name).filter(|k| !k.trim().is_empty()) {
            tracing::debug!(source = name, "API key found in environment");
            return Ok(key);
        }
    }

    if let Some(key) = store.lookup(API_KEY_NAME)?.filter(|k| !k.trim().is_empty()) {
        tracing::debug!(path = %store.path().display(), "API key found in secrets file");
        return Ok(key);
    }

    anyhow::bail!(
        "Missing API key. Set {API_KEY_NAME} in the environment or in {}.",
        store.path().display()
    )
}
