//! Seams to the external services Parley consumes.
//!
//! Orders, profiles, and credentials are owned by other systems; the
//! engine only ever talks to them through these traits. The server wires
//! HTTP-backed implementations, tests use mocks or fixtures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{ChatError, ChatResult};

/// Lifecycle of a work order as reported by the order service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Assigned => "assigned",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// An order as the chat engine sees it. `provider_id` is `None` until
/// the order has been assigned; no chat can exist before that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub requester_id: String,
    pub provider_id: Option<String>,
    pub status: OrderStatus,
}

impl OrderRecord {
    pub fn is_party(&self, participant_id: &str) -> bool {
        self.requester_id == participant_id
            || self.provider_id.as_deref() == Some(participant_id)
    }

    /// Whether new messages may still be appended. History stays
    /// readable regardless; only cancellation closes the channel.
    pub fn accepts_messages(&self) -> bool {
        self.provider_id.is_some() && self.status != OrderStatus::Cancelled
    }
}

/// Public profile snapshot for rendering the counterparty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub participant_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub rating: Option<f64>,
}

impl ProfileSnapshot {
    /// Fallback used when the profile service cannot resolve an id, so
    /// a sidebar render never fails outright over a missing profile.
    pub fn placeholder(participant_id: &str) -> Self {
        Self {
            participant_id: participant_id.to_string(),
            display_name: participant_id.to_string(),
            avatar_url: None,
            rating: None,
        }
    }
}

/// Resolves a connection credential to a stable participant identity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> ChatResult<String>;
}

/// Looks up orders by id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderDirectory: Send + Sync {
    async fn order(&self, order_id: &str) -> ChatResult<OrderRecord>;
}

/// Looks up participant profiles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn profile(&self, participant_id: &str) -> ChatResult<ProfileSnapshot>;
}

/// Convenience guard shared by the services: the order must exist and
/// the caller must be one of its two parties.
pub(crate) fn require_party<'a>(
    order: &'a OrderRecord,
    participant_id: &str,
) -> ChatResult<&'a OrderRecord> {
    if !order.is_party(participant_id) {
        return Err(ChatError::permission_denied(format!(
            "participant is not a party to order {}",
            order.order_id
        )));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigned_order() -> OrderRecord {
        OrderRecord {
            order_id: "O42".to_string(),
            requester_id: "p1".to_string(),
            provider_id: Some("p2".to_string()),
            status: OrderStatus::Assigned,
        }
    }

    #[test]
    fn party_check_covers_both_sides() {
        let order = assigned_order();
        assert!(order.is_party("p1"));
        assert!(order.is_party("p2"));
        assert!(!order.is_party("p3"));
    }

    #[test]
    fn unassigned_order_has_single_party() {
        let order = OrderRecord {
            provider_id: None,
            status: OrderStatus::Pending,
            ..assigned_order()
        };
        assert!(order.is_party("p1"));
        assert!(!order.is_party("p2"));
        assert!(!order.accepts_messages());
    }

    #[test]
    fn cancelled_order_rejects_messages_but_completed_does_not() {
        let cancelled = OrderRecord {
            status: OrderStatus::Cancelled,
            ..assigned_order()
        };
        assert!(!cancelled.accepts_messages());

        let completed = OrderRecord {
            status: OrderStatus::Completed,
            ..assigned_order()
        };
        assert!(completed.accepts_messages());
    }

    #[test]
    fn require_party_rejects_outsiders() {
        let order = assigned_order();
        assert!(require_party(&order, "p1").is_ok());
        let err = require_party(&order, "intruder").unwrap_err();
        assert_eq!(err.code(), "permission_error");
    }

    #[tokio::test]
    async fn mocked_directory_drives_the_party_guard() {
        let mut orders = MockOrderDirectory::new();
        orders
            .expect_order()
            .withf(|id| id == "O42")
            .returning(|_| Ok(assigned_order()));

        let order = orders.order("O42").await.unwrap();
        assert!(require_party(&order, "p2").is_ok());
        assert!(require_party(&order, "p9").is_err());
    }
}
