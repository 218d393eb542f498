//! Response payloads shared between services and the wire layer.

use serde::{Deserialize, Serialize};

use parley_database::{ChatRoom, ConversationRow, StoredMessage};

use crate::directory::{OrderRecord, OrderStatus, ProfileSnapshot};

/// Wire representation of a message. Internal row ids stay internal;
/// clients see the cuid public ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub seq: i64,
    pub delivered: bool,
    pub seen: bool,
    pub created_at: String,
}

impl MessagePayload {
    pub fn from_stored(message: StoredMessage, chat_public_id: &str) -> Self {
        Self {
            id: message.public_id,
            chat_id: chat_public_id.to_string(),
            sender_id: message.sender_id,
            content: message.content,
            seq: message.seq,
            delivered: message.delivered,
            seen: message.seen,
            created_at: message.created_at,
        }
    }
}

/// Condensed order details returned alongside history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub status: OrderStatus,
}

impl From<&OrderRecord> for OrderSummary {
    fn from(order: &OrderRecord) -> Self {
        Self {
            order_id: order.order_id.clone(),
            status: order.status,
        }
    }
}

/// One page of backward history plus the context a client needs to
/// render the chat header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub messages: Vec<MessagePayload>,
    pub next_cursor: Option<i64>,
    pub partner: ProfileSnapshot,
    pub order: OrderSummary,
}

/// Sidebar entry for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub chat_id: String,
    pub order_id: String,
    pub partner: ProfileSnapshot,
    pub last_message_preview: Option<String>,
    pub last_sender_id: Option<String>,
    pub unread_count: i64,
    pub updated_at: String,
}

impl ConversationSummary {
    pub fn from_row(row: ConversationRow, chat: &ChatRoom, partner: ProfileSnapshot) -> Self {
        Self {
            chat_id: chat.public_id.clone(),
            order_id: row.order_id,
            partner,
            last_message_preview: row.last_message_preview,
            last_sender_id: row.last_sender_id,
            unread_count: row.unread_count,
            updated_at: row.updated_at,
        }
    }
}
