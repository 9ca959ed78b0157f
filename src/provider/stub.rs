use super::{ModelClient, ModelError, ModelReply, ModelRequest};
use futures_core::future::BoxFuture;

/// Offline client that echoes the prompt back. Needs no credentials.
#[derive(Debug, Default, Clone)]
pub struct StubClient;

impl StubClient {
    pub fn new() -> Self {
        Self
    }
}

impl ModelClient for StubClient {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn generate(&self, req: ModelRequest) -> BoxFuture<'static, Result<ModelReply, ModelError>> {
        Box::pin(async move {
            let text = format!(
                "You said: {}\n\n_(stub provider, {} earlier messages in history)_",
                req.prompt,
                req.history.len()
            );
            Ok(ModelReply::new(text))
        })
    }
}
