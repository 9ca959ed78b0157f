use crate::provider::{GroundingSource, ModelRole};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Provider role for this label: `user` stays `user`, anything else is `model`.
    pub fn model_role(self) -> ModelRole {
        match self {
            Role::User => ModelRole::User,
            Role::Assistant => ModelRole::Model,
        }
    }
}

/// One chat message. Fields are private so a stored message never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sources: Vec<GroundingSource>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources: Vec::new(),
        }
    }

    /// Attach the pages a grounded reply cited.
    pub fn with_sources(mut self, sources: Vec<GroundingSource>) -> Self {
        self.sources = sources;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn sources(&self) -> &[GroundingSource] {
        &self.sources
    }
}

/// Append-only, in-memory message log for one session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages in insertion order.
    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_insertion_order() {
        let mut c = Conversation::new();
        assert!(c.is_empty());

        c.append(Message::user("one"));
        c.append(Message::assistant("two"));
        c.append(Message::user("three"));

        let contents: Vec<&str> = c.all().iter().map(Message::content).collect();
        assert_eq!(contents, ["one", "two", "three"]);
        assert_eq!(c.len(), 3);
        assert_eq!(c.all()[1].role(), Role::Assistant);
    }

    #[test]
    fn roles_map_to_provider_roles() {
        assert_eq!(Role::User.model_role(), ModelRole::User);
        assert_eq!(Role::Assistant.model_role(), ModelRole::Model);
    }

    #[test]
    fn message_serializes_role_lowercase() {
        let v = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(v, serde_json::json!({ "role": "assistant", "content": "hi" }));
    }

    #[test]
    fn sources_serialize_only_when_present() {
        let msg = Message::assistant("see link").with_sources(vec![GroundingSource {
            title: "Docs".to_string(),
            uri: "https://example.com/docs".to_string(),
        }]);
        let v = serde_json::to_value(msg).unwrap();
        assert_eq!(
            v["sources"],
            serde_json::json!([{ "title": "Docs", "uri": "https://example.com/docs" }])
        );
    }
}
