use super::{GroundingSource, ModelClient, ModelError, ModelReply, ModelRequest};
use futures_core::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
enum Step {
    Answer(Result<ModelReply, ModelError>),
    Hang,
}

/// Replies with queued results in order and records every request it sees.
/// Once the queue is empty it answers `reply to <prompt>`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedClient {
    script: Arc<Mutex<VecDeque<Step>>>,
    seen: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_reply(self, text: &str) -> Self {
        self.push(Step::Answer(Ok(ModelReply::new(text))))
    }

    pub fn then_reply_with_sources(self, text: &str, sources: Vec<GroundingSource>) -> Self {
        self.push(Step::Answer(Ok(ModelReply {
            text: text.to_string(),
            sources,
        })))
    }

    pub fn then_fail(self, err: ModelError) -> Self {
        self.push(Step::Answer(Err(err)))
    }

    /// The next call never resolves.
    pub fn then_hang(self) -> Self {
        self.push(Step::Hang)
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.seen.lock().unwrap().clone()
    }

    fn push(self, step: Step) -> Self {
        self.script.lock().unwrap().push_back(step);
        self
    }
}

impl ModelClient for ScriptedClient {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn generate(&self, req: ModelRequest) -> BoxFuture<'static, Result<ModelReply, ModelError>> {
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::Answer(Ok(ModelReply::new(format!("reply to {}", req.prompt)))));
        self.seen.lock().unwrap().push(req);
        match next {
            Step::Answer(result) => Box::pin(async move { result }),
            Step::Hang => Box::pin(std::future::pending()),
        }
    }
}
