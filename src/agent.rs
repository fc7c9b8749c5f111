use crate::analyzer::{ analyze, AnalysisSummary };
use crate::cli::Args;
use crate::config::knowledge::{
    initialize_knowledge,
    reload_knowledge_if_changed,
    KnowledgeError,
    LoadedKnowledge,
};
use crate::history::{ initialize_history_store, HistoryStore };
use crate::knowledge::KnowledgeBase;
use crate::models::chat::{ ChatMessage, Conversation };
use crate::response::{ self, GREETING };

use log::{ debug, info };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub struct SymptomAgent {
    knowledge: RwLock<LoadedKnowledge>,
    history_store: Arc<dyn HistoryStore>,
    thinking_delay: Duration,
}

impl SymptomAgent {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let knowledge = initialize_knowledge(args.knowledge_path.as_deref()).map_err(|e|
            format!(
                "Failed to load knowledge base '{}': {}",
                args.knowledge_path.as_deref().unwrap_or("built-in"),
                e
            )
        )?;
        let history_store = initialize_history_store();
        Ok(Self::with_parts(knowledge, history_store, args.thinking_delay()))
    }

    pub fn with_parts(
        knowledge: LoadedKnowledge,
        history_store: Arc<dyn HistoryStore>,
        thinking_delay: Duration
    ) -> Self {
        Self {
            knowledge: RwLock::new(knowledge),
            history_store,
            thinking_delay,
        }
    }

    pub fn thinking_delay(&self) -> Duration {
        self.thinking_delay
    }

    pub async fn knowledge(&self) -> Arc<KnowledgeBase> {
        Arc::clone(&self.knowledge.read().await.knowledge)
    }

    /// Analyzes `input` and renders the advisory reply without touching history.
    pub async fn respond(&self, input: &str) -> ChatMessage {
        let knowledge = self.knowledge().await;
        let result = analyze(&knowledge, input);
        debug!(
            "Analyzed input: {} match(es), severity {}",
            result.matches.len(),
            result.severity
        );
        response::generate(&result)
    }

    pub async fn analyze_summary(&self, input: &str) -> (AnalysisSummary, String) {
        let knowledge = self.knowledge().await;
        let result = analyze(&knowledge, input);
        (result.summary(), response::render(&result))
    }

    /// Seeds the greeting into an empty conversation and returns the
    /// conversation as it stands.
    pub async fn open_conversation(
        &self,
        conversation_id: &str
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>> {
        let conversation = self.history_store.get_conversation(conversation_id).await?;
        if !conversation.messages.is_empty() {
            return Ok(conversation);
        }
        self.history_store.add_message(conversation_id, ChatMessage::bot(GREETING)).await?;
        self.history_store.get_conversation(conversation_id).await
    }

    pub async fn record_user_message(
        &self,
        conversation_id: &str,
        content: &str
    ) -> Result<ChatMessage, Box<dyn Error + Send + Sync>> {
        let message = ChatMessage::user(content);
        self.history_store.add_message(conversation_id, message.clone()).await?;
        Ok(message)
    }

    /// Generates the reply for `content` and appends it to the conversation.
    pub async fn reply(
        &self,
        conversation_id: &str,
        content: &str
    ) -> Result<ChatMessage, Box<dyn Error + Send + Sync>> {
        let message = self.respond(content).await;
        self.history_store.add_message(conversation_id, message.clone()).await?;
        Ok(message)
    }

    /// Full turn: append the user message, wait out the thinking delay, then
    /// append and return the bot reply.
    pub async fn process_message(
        &self,
        conversation_id: &str,
        content: &str
    ) -> Result<ChatMessage, Box<dyn Error + Send + Sync>> {
        self.record_user_message(conversation_id, content).await?;
        tokio::time::sleep(self.thinking_delay).await;
        self.reply(conversation_id, content).await
    }

    pub async fn history(
        &self,
        conversation_id: &str
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>> {
        self.history_store.get_conversation(conversation_id).await
    }

    /// Empties the conversation and re-seeds the greeting.
    pub async fn clear_conversation(
        &self,
        conversation_id: &str
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>> {
        self.history_store.clear_conversation(conversation_id).await?;
        info!("Cleared conversation {}", conversation_id);
        self.open_conversation(conversation_id).await
    }

    pub async fn close_conversation(
        &self,
        conversation_id: &str
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.history_store.remove_conversation(conversation_id).await
    }

    pub async fn reload_knowledge_if_changed(&self) -> Result<bool, KnowledgeError> {
        let mut knowledge = self.knowledge.write().await;
        match reload_knowledge_if_changed(&knowledge)? {
            Some(reloaded) => {
                info!("Knowledge base reloaded ({} symptom entries)", reloaded.knowledge.len());
                *knowledge = reloaded;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistoryStore;
    use crate::models::chat::Role;
    use crate::response::FALLBACK;

    fn agent(delay: Duration) -> SymptomAgent {
        SymptomAgent::with_parts(
            LoadedKnowledge::builtin(),
            Arc::new(MemoryHistoryStore::new()),
            delay
        )
    }

    #[tokio::test]
    async fn open_seeds_greeting_once() {
        let agent = agent(Duration::ZERO);
        let first = agent.open_conversation("c").await.unwrap();
        assert_eq!(first.messages.len(), 1);
        assert_eq!(first.messages[0].role, Role::Bot);
        assert_eq!(first.messages[0].content, GREETING);

        let again = agent.open_conversation("c").await.unwrap();
        assert_eq!(again.messages.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn process_message_appends_user_then_bot() {
        let agent = agent(Duration::from_millis(500));
        agent.open_conversation("c").await.unwrap();

        let started = tokio::time::Instant::now();
        let reply = agent.process_message("c", "아무 문제 없어요").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(reply.content, FALLBACK);

        let history = agent.history("c").await.unwrap();
        let roles: Vec<Role> = history.messages
            .iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(roles, vec![Role::Bot, Role::User, Role::Bot]);
        assert_eq!(history.messages[1].content, "아무 문제 없어요");
    }

    #[tokio::test]
    async fn clear_reseeds_greeting() {
        let agent = agent(Duration::ZERO);
        agent.open_conversation("c").await.unwrap();
        agent.process_message("c", "기침").await.unwrap();
        let cleared = agent.clear_conversation("c").await.unwrap();
        assert_eq!(cleared.messages.len(), 1);
        assert_eq!(cleared.messages[0].content, GREETING);
    }

    #[tokio::test]
    async fn analyze_summary_matches_rendered_reply() {
        let agent = agent(Duration::ZERO);
        let (summary, rendered) = agent.analyze_summary("매우 심한 두통").await;
        assert_eq!(summary.matched, vec!["두통".to_string()]);
        assert_eq!(rendered, agent.respond("매우 심한 두통").await.content);
    }
}
