use crate::config::Settings;
use crate::provider::{self, ModelClient};
use crate::secrets::{self, SecretStore};
use anyhow::Context;
use std::sync::Arc;

pub fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

/// Startup credential gate: resolve the key and configure the model client.
///
/// Any error here is fatal for the process; surfaces must not accept input
/// after it.
pub fn build_client(
    http: &reqwest::Client,
    settings: &Settings,
    store: &SecretStore,
) -> anyhow::Result<Arc<dyn ModelClient>> {
    match settings.provider.as_str() {
        "google" => {
            #[cfg(feature = "google")]
            {
                let api_key = secrets::resolve_api_key(store)?;
                let client = provider::google::GoogleClient::new(
                    http.clone(),
                    api_key,
                    settings.model.clone(),
                    settings.api_base.as_deref(),
                    provider::google::GenerationOptions {
                        temperature: settings.temperature,
                        grounding: settings.grounding,
                    },
                )
                .context("invalid Gemini API base URL")?;
                tracing::info!(
                    model = client.model(),
                    grounding = settings.grounding,
                    "google model client ready"
                );
                Ok(Arc::new(client))
            }
            #[cfg(not(feature = "google"))]
            {
                let _ = http;
                let _ = store;
                anyhow::bail!("google provider is not enabled in this build")
            }
        }
        "stub" => {
            tracing::info!("stub model client ready");
            Ok(Arc::new(provider::stub::StubClient::new()))
        }
        other => anyhow::bail!("unknown provider: {other}"),
    }
}
