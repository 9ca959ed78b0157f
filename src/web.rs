use crate::conversation::Message;
use crate::page;
use crate::provider::{ModelClient, ModelError};
use crate::turn::{Session, TurnOutcome};
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
///
/// One session per server process. The session mutex is held for the whole
/// model call, so interactions run one at a time.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    title: String,
    gate: Gate,
}

enum Gate {
    Ready {
        client: Arc<dyn ModelClient>,
        session: Mutex<Session>,
    },
    Halted {
        message: String,
    },
}

impl AppState {
    pub fn ready(title: impl Into<String>, client: Arc<dyn ModelClient>, session: Session) -> Self {
        Self::with_gate(
            title,
            Gate::Ready {
                client,
                session: Mutex::new(session),
            },
        )
    }

    /// The credential check failed; serve the error and nothing else.
    pub fn halted(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_gate(
            title,
            Gate::Halted {
                message: message.into(),
            },
        )
    }

    fn with_gate(title: impl Into<String>, gate: Gate) -> Self {
        Self {
            inner: Arc::new(Inner {
                title: title.into(),
                gate,
            }),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(show_page).post(submit_form))
        .route("/api/transcript", get(get_transcript))
        .route("/api/chat", post(post_chat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!("chat page listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .await
        .context("server error")
}

// ============================================================
// Page
// ============================================================

#[derive(Debug, Deserialize)]
struct PromptForm {
    #[serde(default)]
    prompt: String,
}

async fn show_page(State(state): State<AppState>) -> Html<String> {
    let title = &state.inner.title;
    match &state.inner.gate {
        Gate::Halted { message } => Html(page::render_halted(title, message)),
        Gate::Ready { session, .. } => {
            let session = session.lock().await;
            Html(page::render_chat(title, session.transcript(), None))
        }
    }
}

async fn submit_form(State(state): State<AppState>, Form(form): Form<PromptForm>) -> Response {
    let title = &state.inner.title;
    match &state.inner.gate {
        Gate::Halted { message } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Html(page::render_halted(title, message)),
        )
            .into_response(),
        Gate::Ready { client, session } => {
            let mut session = session.lock().await;
            let outcome = session.submit(client.as_ref(), &form.prompt).await;
            let error = match &outcome {
                TurnOutcome::Failed(e) => Some(e.message.as_str()),
                _ => None,
            };
            Html(page::render_chat(title, session.transcript(), error)).into_response()
        }
    }
}

// ============================================================
// JSON API
// ============================================================

#[derive(Debug, Serialize)]
struct TranscriptResponse {
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum ChatStatus {
    Replied,
    Failed,
    Ignored,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    status: ChatStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ModelError>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn halted_json(message: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

async fn get_transcript(State(state): State<AppState>) -> Response {
    match &state.inner.gate {
        Gate::Halted { message } => halted_json(message),
        Gate::Ready { session, .. } => {
            let session = session.lock().await;
            Json(TranscriptResponse {
                messages: session.transcript().to_vec(),
            })
            .into_response()
        }
    }
}

async fn post_chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let (client, session) = match &state.inner.gate {
        Gate::Halted { message } => return halted_json(message),
        Gate::Ready { client, session } => (client, session),
    };

    let mut session = session.lock().await;
    let outcome = session.submit(client.as_ref(), &req.prompt).await;
    tracing::debug!(messages = session.conversation().len(), "chat request handled");

    let (status, reply, error) = match outcome {
        TurnOutcome::Replied(msg) => (ChatStatus::Replied, Some(msg.content().to_string()), None),
        TurnOutcome::Failed(e) => (ChatStatus::Failed, None, Some(e)),
        // The mutex keeps a second turn from starting while one is in flight.
        TurnOutcome::NoSubmission | TurnOutcome::Busy => (ChatStatus::Ignored, None, None),
    };

    Json(ChatResponse {
        status,
        reply,
        error,
        messages: session.transcript().to_vec(),
    })
    .into_response()
}
