//! Room lifecycle and the join protocol.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use parley_database::{ChatRepository, ChatRoom, ConversationRepository};

use crate::directory::{require_party, OrderDirectory, OrderRecord};
use crate::registry::RoomRegistry;
use crate::types::{ChatError, ChatResult};

/// Resolves orders to chats and manages broadcast-group membership.
pub struct RoomService {
    chats: ChatRepository,
    conversations: ConversationRepository,
    orders: Arc<dyn OrderDirectory>,
    registry: Arc<RoomRegistry>,
}

impl RoomService {
    pub fn new(
        pool: SqlitePool,
        orders: Arc<dyn OrderDirectory>,
        registry: Arc<RoomRegistry>,
    ) -> Self {
        Self {
            chats: ChatRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool),
            orders,
            registry,
        }
    }

    /// Join the chat for an order, creating the chat lazily on first
    /// contact. Idempotent per session: a second join returns the same
    /// chat without re-registering the broadcast target.
    ///
    /// Fails with `NotFound` when the order is absent or unassigned and
    /// `PermissionDenied` when the caller is not one of its two parties.
    pub async fn join(
        &self,
        order_id: &str,
        participant_id: &str,
        session_id: &str,
    ) -> ChatResult<ChatRoom> {
        let order = self.orders.order(order_id).await?;
        let chat = self.resolve_or_create_chat(&order, participant_id).await?;

        let newly_joined = self.registry.join(chat.id, session_id).await;
        if newly_joined {
            info!(
                order_id,
                chat_id = %chat.public_id,
                participant_id,
                session_id,
                "session joined chat"
            );
        }

        Ok(chat)
    }

    /// Resolve the existing chat for an order on behalf of a member.
    /// Used by send/typing/mark-read, which all require that a chat
    /// already exists.
    pub async fn resolve_for_member(
        &self,
        order_id: &str,
        participant_id: &str,
    ) -> ChatResult<(ChatRoom, OrderRecord)> {
        let order = self.orders.order(order_id).await?;
        require_party(&order, participant_id)?;

        let chat = self
            .chats
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| ChatError::not_found("chat", order_id))?;

        if !chat.is_member(participant_id) {
            return Err(ChatError::permission_denied(
                "participant is not a member of this chat",
            ));
        }

        Ok((chat, order))
    }

    /// Remove the session from the chat's broadcast group only.
    pub async fn leave(&self, chat_id: i64, session_id: &str) {
        self.registry.leave(chat_id, session_id).await;
    }

    async fn resolve_or_create_chat(
        &self,
        order: &OrderRecord,
        participant_id: &str,
    ) -> ChatResult<ChatRoom> {
        let Some(provider_id) = order.provider_id.as_deref() else {
            // No counterparty yet, so there is nothing to talk in.
            return Err(ChatError::not_found("chat", &order.order_id));
        };

        require_party(order, participant_id)?;

        if let Some(existing) = self.chats.find_by_order_id(&order.order_id).await? {
            return Ok(existing);
        }

        let chat = self
            .chats
            .create_for_order(&order.order_id, &order.requester_id, provider_id)
            .await?;

        // Seed both sidebars so the conversation shows up before the
        // first message.
        self.conversations
            .ensure(chat.id, &chat.order_id, &chat.requester_id, &chat.provider_id)
            .await?;
        self.conversations
            .ensure(chat.id, &chat.order_id, &chat.provider_id, &chat.requester_id)
            .await?;

        Ok(chat)
    }
}
