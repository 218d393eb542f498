//! Event types for real-time chat updates.
//!
//! These are the broadcast events fanned out to every connected session
//! of a chat. Acks to the initiating session are a separate concern and
//! live in the server's wire layer.

use serde::{Deserialize, Serialize};

use crate::types::MessagePayload;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message was appended to the chat. Delivered to every joined
    /// session, including the sender's other devices.
    MessageReceived {
        chat_id: String,
        message: MessagePayload,
    },

    /// The counterparty started composing.
    TypingStarted {
        chat_id: String,
        participant_id: String,
    },

    /// The counterparty stopped composing, explicitly or by expiry.
    TypingStopped {
        chat_id: String,
        participant_id: String,
    },

    /// The counterparty read the chat up to now.
    ReadReceipt { chat_id: String, reader_id: String },

    /// The counterparty's last session disconnected.
    PartnerOffline {
        chat_id: String,
        participant_id: String,
    },
}

impl ChatEvent {
    pub fn chat_id(&self) -> &str {
        match self {
            ChatEvent::MessageReceived { chat_id, .. }
            | ChatEvent::TypingStarted { chat_id, .. }
            | ChatEvent::TypingStopped { chat_id, .. }
            | ChatEvent::ReadReceipt { chat_id, .. }
            | ChatEvent::PartnerOffline { chat_id, .. } => chat_id,
        }
    }

    /// Event type name for logging.
    pub fn event_type_name(&self) -> &'static str {
        match self {
            ChatEvent::MessageReceived { .. } => "message_received",
            ChatEvent::TypingStarted { .. } => "typing_started",
            ChatEvent::TypingStopped { .. } => "typing_stopped",
            ChatEvent::ReadReceipt { .. } => "read_receipt",
            ChatEvent::PartnerOffline { .. } => "partner_offline",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = ChatEvent::TypingStarted {
            chat_id: "c1".to_string(),
            participant_id: "p1".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "typing_started");
        assert_eq!(json["chat_id"], "c1");
    }
}
