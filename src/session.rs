use crate::agent::SymptomAgent;
use crate::models::chat::{ ChatMessage, Conversation };
use crate::reveal::{ run_reveal, Typewriter };

use log::{ debug, error, info };
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{ unbounded_channel, UnboundedReceiver, UnboundedSender };
use tokio::task::JoinHandle;

/// What a presentation surface needs to render, in the order it must render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A message was appended to the conversation.
    Appended(ChatMessage),
    /// The artificial thinking delay started; show a typing placeholder.
    Typing,
    /// Next character of the latest bot message.
    Reveal(char),
    RevealComplete,
    /// The reveal in progress was stopped; show that message in full.
    RevealCancelled,
    /// The log was emptied and re-seeded; redraw from these messages.
    Cleared(Conversation),
    Failed(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a response is already pending")]
    Busy,
    #[error("history error: {0}")] History(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Blank input; nothing was appended.
    Ignored,
    Accepted(ChatMessage),
}

/// Spawned task that is aborted when dropped.
struct ScheduledTask {
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    fn spawn<F>(future: F) -> Self
        where F: std::future::Future<Output = ()> + Send + 'static
    {
        Self { handle: Some(tokio::spawn(future)) }
    }

    /// Aborts the task and waits until it has actually stopped.
    async fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// One user's chat view over a conversation.
///
/// Owns the single response task (thinking delay, append, reveal). The task
/// is cancelled on clear, superseded reveals are cancelled on the next
/// submission, and dropping the session tears the task down.
pub struct ChatSession {
    agent: Arc<SymptomAgent>,
    conversation_id: String,
    reveal_interval: Duration,
    responding: Arc<AtomicBool>,
    revealing: Arc<AtomicBool>,
    task: Option<ScheduledTask>,
    events: UnboundedSender<SessionEvent>,
}

impl ChatSession {
    /// Opens (or resumes) `conversation_id`, seeding the greeting if it is new.
    pub async fn open(
        agent: Arc<SymptomAgent>,
        conversation_id: impl Into<String>,
        reveal_interval: Duration
    ) -> Result<(Self, UnboundedReceiver<SessionEvent>, Conversation), SessionError> {
        let conversation_id = conversation_id.into();
        let conversation = agent
            .open_conversation(&conversation_id).await
            .map_err(|e| SessionError::History(e.to_string()))?;
        let (events, receiver) = unbounded_channel();
        debug!("Opened chat session for conversation {}", conversation_id);

        let session = Self {
            agent,
            conversation_id,
            reveal_interval,
            responding: Arc::new(AtomicBool::new(false)),
            revealing: Arc::new(AtomicBool::new(false)),
            task: None,
            events,
        };
        Ok((session, receiver, conversation))
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn is_responding(&self) -> bool {
        self.responding.load(Ordering::SeqCst)
    }

    pub fn is_revealing(&self) -> bool {
        self.revealing.load(Ordering::SeqCst)
    }

    /// Appends the user message and schedules the reply.
    ///
    /// Rejected with [`SessionError::Busy`] while a previous reply is still
    /// pending. A reveal still running from the previous reply is cancelled
    /// first.
    pub async fn submit(&mut self, input: &str) -> Result<Submission, SessionError> {
        if input.trim().is_empty() {
            return Ok(Submission::Ignored);
        }
        if
            self.responding
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            info!("Rejected submission on {}: response pending", self.conversation_id);
            return Err(SessionError::Busy);
        }

        self.cancel_task().await;

        let user_message = match
            self.agent.record_user_message(&self.conversation_id, input).await
        {
            Ok(message) => message,
            Err(e) => {
                self.responding.store(false, Ordering::SeqCst);
                return Err(SessionError::History(e.to_string()));
            }
        };
        let _ = self.events.send(SessionEvent::Appended(user_message.clone()));
        let _ = self.events.send(SessionEvent::Typing);

        let agent = Arc::clone(&self.agent);
        let conversation_id = self.conversation_id.clone();
        let input = input.to_string();
        let responding = Arc::clone(&self.responding);
        let revealing = Arc::clone(&self.revealing);
        let events = self.events.clone();
        let reveal_interval = self.reveal_interval;

        self.task = Some(
            ScheduledTask::spawn(async move {
                tokio::time::sleep(agent.thinking_delay()).await;

                let reply = match agent.reply(&conversation_id, &input).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        error!("Failed to append reply to {}: {}", conversation_id, e);
                        responding.store(false, Ordering::SeqCst);
                        let _ = events.send(SessionEvent::Failed(e.to_string()));
                        return;
                    }
                };

                // The reveal may only start once the message is in history.
                revealing.store(true, Ordering::SeqCst);
                responding.store(false, Ordering::SeqCst);
                if events.send(SessionEvent::Appended(reply.clone())).is_err() {
                    revealing.store(false, Ordering::SeqCst);
                    return;
                }

                let mut typewriter = Typewriter::new(reply.content);
                let finished = run_reveal(&mut typewriter, reveal_interval, |ch| {
                    events.send(SessionEvent::Reveal(ch)).is_ok()
                }).await;
                revealing.store(false, Ordering::SeqCst);
                if finished {
                    let _ = events.send(SessionEvent::RevealComplete);
                }
            })
        );

        Ok(Submission::Accepted(user_message))
    }

    /// Cancels any pending reply or reveal, empties the conversation and
    /// re-seeds the greeting.
    ///
    /// Everything emitted for the old log precedes [`SessionEvent::Cleared`].
    pub async fn clear(&mut self) -> Result<Conversation, SessionError> {
        self.cancel_task().await;
        self.responding.store(false, Ordering::SeqCst);
        let conversation = self.agent
            .clear_conversation(&self.conversation_id).await
            .map_err(|e| SessionError::History(e.to_string()))?;
        let _ = self.events.send(SessionEvent::Cleared(conversation.clone()));
        Ok(conversation)
    }

    pub async fn history(&self) -> Result<Conversation, SessionError> {
        self.agent
            .history(&self.conversation_id).await
            .map_err(|e| SessionError::History(e.to_string()))
    }

    async fn cancel_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel().await;
        }
        if self.revealing.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(SessionEvent::RevealCancelled);
        }
    }
}
