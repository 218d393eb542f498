//! Chat room entity definitions

use serde::{Deserialize, Serialize};

/// A per-order chat room between exactly two participants.
///
/// Rows are created lazily on first join, once the backing order has an
/// assigned provider, and are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: i64,
    pub public_id: String,
    pub order_id: String,
    pub requester_id: String,
    pub provider_id: String,
    pub created_at: String,
}

impl ChatRoom {
    pub fn is_member(&self, participant_id: &str) -> bool {
        self.requester_id == participant_id || self.provider_id == participant_id
    }

    /// The other party, or `None` for a non-member.
    pub fn partner_of(&self, participant_id: &str) -> Option<&str> {
        if participant_id == self.requester_id {
            Some(&self.provider_id)
        } else if participant_id == self.provider_id {
            Some(&self.requester_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> ChatRoom {
        ChatRoom {
            id: 1,
            public_id: "c_room".to_string(),
            order_id: "O42".to_string(),
            requester_id: "p1".to_string(),
            provider_id: "p2".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn membership_covers_both_parties_only() {
        let room = room();
        assert!(room.is_member("p1"));
        assert!(room.is_member("p2"));
        assert!(!room.is_member("p3"));
    }

    #[test]
    fn partner_of_resolves_counterparty() {
        let room = room();
        assert_eq!(room.partner_of("p1"), Some("p2"));
        assert_eq!(room.partner_of("p2"), Some("p1"));
        assert_eq!(room.partner_of("p3"), None);
    }
}
