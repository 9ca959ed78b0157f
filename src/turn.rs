use crate::conversation::{Conversation, Message};
use crate::provider::{HistoryEntry, ModelClient, ModelError, ModelReply, ModelRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingResponse,
}

/// What a surface should show after a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Empty input; nothing changed.
    NoSubmission,
    /// A previous turn is still waiting for its reply.
    Busy,
    Replied(Message),
    Failed(ModelError),
}

/// A started turn. Must be handed back to [`Session::complete_turn`].
#[derive(Debug)]
#[must_use]
pub struct PendingTurn {
    request: ModelRequest,
}

impl PendingTurn {
    pub fn request(&self) -> &ModelRequest {
        &self.request
    }
}

#[derive(Debug)]
pub enum Submission {
    Ignored,
    Busy,
    Started(PendingTurn),
}

/// One conversation plus the turn currently in flight, if any.
///
/// A failed or abandoned turn leaves its user message in place without a reply.
#[derive(Debug)]
pub struct Session {
    conversation: Conversation,
    system_instruction: String,
    state: TurnState,
}

impl Session {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            conversation: Conversation::new(),
            system_instruction: system_instruction.into(),
            state: TurnState::Idle,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn transcript(&self) -> &[Message] {
        self.conversation.all()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Record the user's prompt and build the request for the model.
    pub fn begin_turn(&mut self, prompt: &str) -> Submission {
        if prompt.trim().is_empty() {
            return Submission::Ignored;
        }
        if self.state == TurnState::AwaitingResponse {
            return Submission::Busy;
        }

        self.conversation.append(Message::user(prompt));

        let all = self.conversation.all();
        let history = history_payload(&all[..all.len() - 1]);

        tracing::info!(history = history.len(), prompt_chars = prompt.len(), "turn started");
        self.state = TurnState::AwaitingResponse;

        Submission::Started(PendingTurn {
            request: ModelRequest {
                system_instruction: self.system_instruction.clone(),
                history,
                prompt: prompt.to_string(),
            },
        })
    }

    /// Apply the model's answer to a started turn and return to idle.
    pub fn complete_turn(
        &mut self,
        pending: PendingTurn,
        result: Result<ModelReply, ModelError>,
    ) -> TurnOutcome {
        drop(pending);
        self.state = TurnState::Idle;

        match result {
            Ok(reply) => {
                let msg = Message::assistant(reply.text).with_sources(reply.sources);
                self.conversation.append(msg.clone());
                tracing::info!(messages = self.conversation.len(), "turn completed");
                TurnOutcome::Replied(msg)
            }
            Err(err) => {
                tracing::warn!(kind = err.kind.as_str(), error = %err, "turn failed");
                TurnOutcome::Failed(err)
            }
        }
    }

    /// Give up on a started turn without a reply and return to idle.
    pub fn abandon_turn(&mut self, pending: PendingTurn) {
        drop(pending);
        self.state = TurnState::Idle;
        tracing::warn!(messages = self.conversation.len(), "turn abandoned before the model replied");
    }

    /// Run one whole turn against `client`.
    ///
    /// Dropping the returned future mid-call abandons the turn.
    pub async fn submit(&mut self, client: &dyn ModelClient, prompt: &str) -> TurnOutcome {
        let pending = match self.begin_turn(prompt) {
            Submission::Ignored => return TurnOutcome::NoSubmission,
            Submission::Busy => return TurnOutcome::Busy,
            Submission::Started(p) => p,
        };

        let call = client.generate(pending.request().clone());
        let mut in_flight = InFlight {
            session: self,
            pending: Some(pending),
        };
        let result = call.await;
        in_flight.finish(result)
    }
}

struct InFlight<'a> {
    session: &'a mut Session,
    pending: Option<PendingTurn>,
}

impl InFlight<'_> {
    fn finish(&mut self, result: Result<ModelReply, ModelError>) -> TurnOutcome {
        match self.pending.take() {
            Some(pending) => self.session.complete_turn(pending, result),
            None => TurnOutcome::Busy,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.session.abandon_turn(pending);
        }
    }
}

/// Map stored messages to provider history, oldest first.
pub fn history_payload(messages: &[Message]) -> Vec<HistoryEntry> {
    messages
        .iter()
        .map(|m| HistoryEntry {
            role: m.role().model_role(),
            parts: vec![m.content().to_string()],
        })
        .collect()
}
