//! Conversation history handed to the completion engine.

use serde::{Deserialize, Serialize};

/// Oldest user/assistant messages are dropped beyond this many.
pub const MAX_HISTORY_MESSAGES: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Ordered chat history for one session.
///
/// The first message is always the agent's system instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationContext {
    messages: Vec<ChatMessage>,
}

impl ConversationContext {
    pub fn with_instructions(instructions: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::new(Role::System, instructions)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::new(Role::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::new(Role::Assistant, content));
    }

    /// Returns a copy with one extra system message appended, used to steer a
    /// single reply (the greeting) without recording the steer in history.
    pub fn with_turn_instructions(&self, instructions: &str) -> Self {
        let mut scoped = self.clone();
        scoped
            .messages
            .push(ChatMessage::new(Role::System, instructions));
        scoped
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);

        let dialogue = self
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .count();
        if dialogue > MAX_HISTORY_MESSAGES {
            if let Some(oldest) = self.messages.iter().position(|m| m.role != Role::System) {
                self.messages.remove(oldest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_come_first() {
        let mut ctx = ConversationContext::with_instructions("be brief");
        ctx.push_user("hi");
        ctx.push_assistant("hello");
        assert_eq!(ctx.messages()[0], ChatMessage::new(Role::System, "be brief"));
        assert_eq!(ctx.messages().len(), 3);
    }

    #[test]
    fn turn_instructions_do_not_leak() {
        let ctx = ConversationContext::with_instructions("be brief");
        let scoped = ctx.with_turn_instructions("greet the user");
        assert_eq!(scoped.messages().len(), 2);
        assert_eq!(ctx.messages().len(), 1);
    }

    #[test]
    fn history_is_bounded() {
        let mut ctx = ConversationContext::with_instructions("sys");
        for i in 0..(MAX_HISTORY_MESSAGES + 10) {
            ctx.push_user(format!("m{}", i));
        }
        assert_eq!(ctx.messages().len(), MAX_HISTORY_MESSAGES + 1);
        assert_eq!(ctx.messages()[0].role, Role::System);
        assert_eq!(ctx.messages()[1].content, "m10");
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_value(ChatMessage::new(Role::Assistant, "x")).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
