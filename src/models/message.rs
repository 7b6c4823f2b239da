use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Who produced a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    System,
    Tutor,
    Math,
    Physics,
}

impl Sender {
    /// The conversational role this sender maps to when history is
    /// serialized into a prompt.
    pub fn role(&self) -> &'static str {
        match self {
            Sender::User => "user",
            _ => "assistant",
        }
    }
}

/// A single turn in the conversation. Messages are immutable once created;
/// the core never mutates a message after emitting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools_used: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_loading: Option<bool>,
}

impl Message {
    fn new<S: Into<String>>(sender: Sender, content: S) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
            tools_used: None,
            tool_results: None,
            is_loading: None,
        }
    }

    /// Create a user message with the current timestamp.
    pub fn user<S: Into<String>>(content: S) -> Self {
        Message::new(Sender::User, content)
    }

    /// Create a responder message with the current timestamp.
    pub fn agent<S: Into<String>>(sender: Sender, content: S) -> Self {
        Message::new(sender, content)
    }

    /// Attach the names of tools used while producing this message.
    pub fn with_tools_used(mut self, tools: Vec<String>) -> Self {
        self.tools_used = Some(tools);
        self
    }

    /// Attach display-only tool result payloads.
    pub fn with_tool_results(mut self, results: Map<String, Value>) -> Self {
        self.tool_results = Some(results);
        self
    }
}

/// Prior conversation turns supplied by the caller, in chronological order.
/// Read-only to the core; the caller owns truncation to a recency window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    pub history: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ConversationContext {
    pub fn new(history: Vec<Message>) -> Self {
        ConversationContext {
            history,
            metadata: None,
        }
    }

    /// The trailing `limit` turns whose sender passes `keep`, in original
    /// order, serialized as role/content pairs for inclusion in a prompt.
    pub fn recent_turns<F>(&self, limit: usize, keep: F) -> Vec<Value>
    where
        F: Fn(&Sender) -> bool,
    {
        let kept: Vec<&Message> = self.history.iter().filter(|m| keep(&m.sender)).collect();
        let start = kept.len().saturating_sub(limit);
        kept[start..]
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.sender.role(),
                    "content": m.content,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builders() {
        let msg = Message::user("hello");
        assert_eq!(msg.sender, Sender::User);
        assert_eq!(msg.content, "hello");
        assert!(msg.tools_used.is_none());

        let msg = Message::agent(Sender::Math, "answer").with_tools_used(vec!["calculator".into()]);
        assert_eq!(msg.sender, Sender::Math);
        assert_eq!(msg.tools_used.as_deref(), Some(&["calculator".to_string()][..]));
    }

    #[test]
    fn test_sender_serialization() {
        assert_eq!(serde_json::to_string(&Sender::Physics).unwrap(), "\"physics\"");
        assert_eq!(
            serde_json::from_str::<Sender>("\"user\"").unwrap(),
            Sender::User
        );
    }

    #[test]
    fn test_recent_turns_filters_and_limits() {
        let mut history = Vec::new();
        for i in 0..8 {
            history.push(Message::user(format!("q{i}")));
            history.push(Message::agent(Sender::Physics, format!("a{i}")));
            history.push(Message::agent(Sender::Math, format!("m{i}")));
        }
        let context = ConversationContext::new(history);

        let turns = context.recent_turns(5, |s| matches!(s, Sender::User | Sender::Math));
        assert_eq!(turns.len(), 5);
        // Original order preserved, physics turns excluded.
        assert_eq!(turns[0]["content"], "m5");
        assert_eq!(turns[0]["role"], "assistant");
        assert_eq!(turns[1]["content"], "q6");
        assert_eq!(turns[1]["role"], "user");
        assert_eq!(turns[4]["content"], "m7");
    }
}
