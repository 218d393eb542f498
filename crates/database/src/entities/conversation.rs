//! Conversation summary entity definitions

use serde::{Deserialize, Serialize};

/// Per-participant projection of a chat for the conversation sidebar.
/// One row per (chat, participant); maintained on every append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRow {
    pub chat_id: i64,
    pub participant_id: String,
    pub order_id: String,
    pub partner_id: String,
    pub last_message_preview: Option<String>,
    pub last_sender_id: Option<String>,
    pub unread_count: i64,
    pub updated_at: String,
}
