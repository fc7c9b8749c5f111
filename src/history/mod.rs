mod memory;

pub use memory::MemoryHistoryStore;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;
use crate::models::chat::{ ChatMessage, Conversation, Role };

/// Append-only message log for one conversation.
///
/// Messages are never edited or removed individually; `clear` discards the
/// whole log at once.
#[derive(Clone, Debug, Default)]
pub struct ConversationState {
    messages: Vec<ChatMessage>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn add_message(
        &self,
        conversation_id: &str,
        message: ChatMessage
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn get_conversation(
        &self,
        conversation_id: &str
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>>;

    async fn clear_conversation(
        &self,
        conversation_id: &str
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn remove_conversation(
        &self,
        conversation_id: &str
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

pub fn initialize_history_store() -> Arc<dyn HistoryStore> {
    info!("Chat history is kept in memory and discarded on exit");
    Arc::new(MemoryHistoryStore::new())
}

pub fn format_transcript(conversation: &Conversation) -> String {
    if conversation.messages.is_empty() {
        return String::new();
    }
    let mut result = String::new();
    for msg in &conversation.messages {
        let role_display = match msg.role {
            Role::User => "U",
            Role::Bot => "B",
        };
        result.push_str(&format!("[{}] {}\n", role_display, msg.content));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_insertion_order() {
        let mut state = ConversationState::new();
        state.append(ChatMessage::bot("first"));
        state.append(ChatMessage::user("second"));
        state.append(ChatMessage::bot("third"));

        let contents: Vec<&str> = state
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(state.messages().last().map(|m| m.role), Some(Role::Bot));
    }

    #[test]
    fn clear_empties_log() {
        let mut state = ConversationState::new();
        state.append(ChatMessage::user("x"));
        state.clear();
        assert!(state.messages().is_empty());
    }

    #[test]
    fn transcript_tags_roles() {
        let conversation = Conversation {
            id: "c".into(),
            messages: vec![ChatMessage::user("기침"), ChatMessage::bot("답변")],
        };
        assert_eq!(format_transcript(&conversation), "[U] 기침\n[B] 답변\n");
    }
}
