use futures_core::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;

/// Role labels understood by the Generative Language API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    User,
    Model,
}

impl ModelRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelRole::User => "user",
            ModelRole::Model => "model",
        }
    }
}

/// One prior turn, shaped the way the provider wants it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: ModelRole,
    pub parts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub system_instruction: String,

    /// Everything said before `prompt`, oldest first.
    pub history: Vec<HistoryEntry>,
    pub prompt: String,
}

/// A web page the model cited when search grounding is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

impl ModelReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Timeout,
    Auth,
    Quota,
    Provider,
    MalformedResponse,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Transport => "transport",
            FailureKind::Timeout => "timeout",
            FailureKind::Auth => "auth",
            FailureKind::Quota => "quota",
            FailureKind::Provider => "provider",
            FailureKind::MalformedResponse => "malformed_response",
        }
    }
}

/// A failed model call. Callers show `message`; `kind` is informational.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct ModelError {
    pub kind: FailureKind,
    pub message: String,
}

impl ModelError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedResponse, message)
    }
}

/// Model client interface.
///
/// One request in, one complete reply out. The returned future owns
/// everything it needs so surfaces can spawn it.
pub trait ModelClient: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate(&self, req: ModelRequest) -> BoxFuture<'static, Result<ModelReply, ModelError>>;
}
