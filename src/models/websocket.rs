use serde::{ Serialize, Deserialize };
use crate::models::chat::{ ChatMessage, Role };

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "clear")]
    Clear,
    #[serde(rename = "history")]
    History,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A message was appended to the conversation.
    #[serde(rename = "message")] Message {
        role: Role,
        content: String,
        timestamp: i64,
    },
    #[serde(rename = "typing")]
    Typing,
    /// Next revealed fragment of the latest bot message.
    #[serde(rename = "partial")] Partial {
        content: String,
    },
    #[serde(rename = "done")] Done {
        timestamp: i64,
    },
    /// Reveal stopped early; render the last bot message in full.
    #[serde(rename = "reveal_cancelled")]
    RevealCancelled,
    #[serde(rename = "busy")]
    Busy,
    #[serde(rename = "cleared")]
    Cleared,
    #[serde(rename = "history")] History {
        messages: Vec<ChatMessage>,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}

impl From<ChatMessage> for ServerMessage {
    fn from(message: ChatMessage) -> Self {
        ServerMessage::Message {
            role: message.role,
            content: message.content,
            timestamp: message.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_are_tagged() {
        let chat: ClientMessage = serde_json::from_str(r#"{"type":"chat","content":"기침"}"#).unwrap();
        assert_eq!(chat, ClientMessage::Chat { content: "기침".into() });
        let clear: ClientMessage = serde_json::from_str(r#"{"type":"clear"}"#).unwrap();
        assert_eq!(clear, ClientMessage::Clear);
    }

    #[test]
    fn server_message_wire_shape() {
        let json = serde_json::to_value(ServerMessage::Partial { content: "두".into() }).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "partial", "content": "두" }));

        let json = serde_json::to_value(ServerMessage::from(ChatMessage {
            role: Role::Bot,
            content: "hi".into(),
            timestamp: 7,
        })).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "message", "role": "bot", "content": "hi", "timestamp": 7 })
        );
    }
}
