use async_trait::async_trait;
use crate::models::chat::{ ChatMessage, Conversation };
use crate::history::{ ConversationState, HistoryStore };
use std::collections::HashMap;
use std::error::Error;
use tokio::sync::RwLock;

/// Process-local history keyed by conversation id. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryHistoryStore {
    conversations: RwLock<HashMap<String, ConversationState>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn add_message(
        &self,
        conversation_id: &str,
        message: ChatMessage
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conversations = self.conversations.write().await;
        conversations.entry(conversation_id.to_string()).or_default().append(message);
        Ok(())
    }

    async fn get_conversation(
        &self,
        conversation_id: &str
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>> {
        let conversations = self.conversations.read().await;
        let messages = conversations
            .get(conversation_id)
            .map(|state| state.messages().to_vec())
            .unwrap_or_default();

        Ok(Conversation {
            id: conversation_id.to_string(),
            messages,
        })
    }

    async fn clear_conversation(
        &self,
        conversation_id: &str
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conversations = self.conversations.write().await;
        if let Some(state) = conversations.get_mut(conversation_id) {
            state.clear();
        }
        Ok(())
    }

    async fn remove_conversation(
        &self,
        conversation_id: &str
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.conversations.write().await.remove(conversation_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn conversations_are_isolated() {
        let store = MemoryHistoryStore::new();
        store.add_message("a", ChatMessage::user("one")).await.unwrap();
        store.add_message("b", ChatMessage::user("two")).await.unwrap();
        store.add_message("a", ChatMessage::bot("three")).await.unwrap();

        let a = store.get_conversation("a").await.unwrap();
        assert_eq!(a.messages.len(), 2);
        assert_eq!(a.messages[1].content, "three");
        assert_eq!(store.get_conversation("b").await.unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn unknown_conversation_is_empty() {
        let store = MemoryHistoryStore::new();
        let conversation = store.get_conversation("missing").await.unwrap();
        assert_eq!(conversation.id, "missing");
        assert!(conversation.messages.is_empty());
    }

    #[tokio::test]
    async fn clear_and_remove() {
        let store = MemoryHistoryStore::new();
        store.add_message("a", ChatMessage::user("one")).await.unwrap();
        store.clear_conversation("a").await.unwrap();
        assert!(store.get_conversation("a").await.unwrap().messages.is_empty());

        store.add_message("a", ChatMessage::user("two")).await.unwrap();
        store.remove_conversation("a").await.unwrap();
        assert!(store.get_conversation("a").await.unwrap().messages.is_empty());
    }
}
