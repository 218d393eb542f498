//! Message entity definitions

use serde::{Deserialize, Serialize};

/// A durable chat message. Immutable once created; `seq` and `created_at`
/// are assigned by the store, never by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub public_id: String,
    pub chat_id: i64,
    pub sender_id: String,
    pub content: String,
    pub seq: i64,
    pub delivered: bool,
    pub seen: bool,
    pub created_at: String,
}

/// Input for an append. Content is validated upstream; the repository only
/// persists and assigns ordering.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: i64,
    pub sender_id: String,
    pub content: String,
    pub delivered: bool,
}
