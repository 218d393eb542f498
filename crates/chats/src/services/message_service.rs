//! Durable message append and cursor-based history pagination.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, warn};

use parley_config::ChatConfig;
use parley_database::{
    ChatRepository, ChatRoom, ConversationRepository, MessageRepository, NewMessage,
};

use crate::directory::{require_party, OrderDirectory, ProfileDirectory, ProfileSnapshot};
use crate::registry::RoomRegistry;
use crate::types::{ChatError, ChatEvent, ChatResult, HistoryPage, MessagePayload, OrderSummary};

/// Appends messages and serves history pages.
pub struct MessageService {
    chats: ChatRepository,
    messages: MessageRepository,
    conversations: ConversationRepository,
    orders: Arc<dyn OrderDirectory>,
    profiles: Arc<dyn ProfileDirectory>,
    registry: Arc<RoomRegistry>,
    default_page_limit: i64,
    max_page_limit: i64,
}

impl MessageService {
    pub fn new(
        pool: SqlitePool,
        chat_config: &ChatConfig,
        orders: Arc<dyn OrderDirectory>,
        profiles: Arc<dyn ProfileDirectory>,
        registry: Arc<RoomRegistry>,
    ) -> Self {
        Self {
            chats: ChatRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool),
            orders,
            profiles,
            registry,
            default_page_limit: i64::from(chat_config.default_page_limit),
            max_page_limit: i64::from(chat_config.max_page_limit),
        }
    }

    /// Append a message on behalf of a member and fan it out.
    ///
    /// The store assigns sequence and timestamp; client time is never
    /// trusted. Once the insert commits the message exists regardless of
    /// what happens to the sender's connection — the broadcast and the
    /// summary update are not retracted on disconnect.
    pub async fn append(
        &self,
        order_id: &str,
        sender_id: &str,
        content: &str,
    ) -> ChatResult<MessagePayload> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::validation("message content must not be empty"));
        }

        let order = self.orders.order(order_id).await?;
        require_party(&order, sender_id)?;
        if !order.accepts_messages() {
            return Err(ChatError::permission_denied(format!(
                "order {} no longer accepts messages",
                order.order_id
            )));
        }

        let chat = self
            .chats
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| ChatError::not_found("chat", order_id))?;

        if !chat.is_member(sender_id) {
            return Err(ChatError::permission_denied(
                "sender is not a member of this chat",
            ));
        }

        // partner_of cannot fail after the membership check above.
        let partner_id = chat.partner_of(sender_id).unwrap_or_default().to_string();

        let delivered = self.registry.participant_present(chat.id, &partner_id).await;

        let stored = self
            .messages
            .append(&NewMessage {
                chat_id: chat.id,
                sender_id: sender_id.to_string(),
                content: content.to_string(),
                delivered,
            })
            .await?;

        let payload = MessagePayload::from_stored(stored, &chat.public_id);

        self.update_conversation_index(&chat, sender_id, &partner_id, content)
            .await;

        let event = ChatEvent::MessageReceived {
            chat_id: chat.public_id.clone(),
            message: payload.clone(),
        };
        self.registry.broadcast(chat.id, &event).await;

        info!(
            chat_id = %chat.public_id,
            seq = payload.seq,
            sender_id,
            delivered,
            "message appended and broadcast"
        );

        Ok(payload)
    }

    /// Fetch the page of messages older than `cursor`, oldest-to-newest,
    /// with the partner snapshot and order summary a chat screen needs.
    pub async fn fetch_page(
        &self,
        chat_public_id: &str,
        caller_id: &str,
        cursor: Option<i64>,
        limit: Option<i64>,
    ) -> ChatResult<HistoryPage> {
        if let Some(cursor) = cursor {
            if cursor <= 0 {
                return Err(ChatError::validation("cursor must be a positive sequence"));
            }
        }

        let chat = self
            .chats
            .find_by_public_id(chat_public_id)
            .await?
            .ok_or_else(|| ChatError::not_found("chat", chat_public_id))?;

        if !chat.is_member(caller_id) {
            return Err(ChatError::permission_denied(
                "caller is not a member of this chat",
            ));
        }

        let limit = limit
            .unwrap_or(self.default_page_limit)
            .clamp(1, self.max_page_limit);

        let page = self.messages.page_before(chat.id, cursor, limit).await?;

        let partner_id = chat.partner_of(caller_id).unwrap_or_default().to_string();
        let partner = self.partner_snapshot(&partner_id).await;

        let order = self.orders.order(&chat.order_id).await?;

        Ok(HistoryPage {
            messages: page
                .messages
                .into_iter()
                .map(|m| MessagePayload::from_stored(m, &chat.public_id))
                .collect(),
            next_cursor: page.next_cursor,
            partner,
            order: OrderSummary::from(&order),
        })
    }

    async fn update_conversation_index(
        &self,
        chat: &ChatRoom,
        sender_id: &str,
        partner_id: &str,
        content: &str,
    ) {
        // The recipient's unread count only grows while they are not
        // looking at this chat.
        let partner_viewing = self.registry.is_viewing(chat.id, partner_id).await;

        let results = [
            self.conversations
                .record_message(
                    chat.id,
                    &chat.order_id,
                    sender_id,
                    partner_id,
                    sender_id,
                    content,
                    false,
                )
                .await,
            self.conversations
                .record_message(
                    chat.id,
                    &chat.order_id,
                    partner_id,
                    sender_id,
                    sender_id,
                    content,
                    !partner_viewing,
                )
                .await,
        ];

        for result in results {
            if let Err(error) = result {
                // The message itself is durable; a stale sidebar heals on
                // the next append.
                warn!(chat_id = %chat.public_id, %error, "conversation index update failed");
            }
        }
    }

    async fn partner_snapshot(&self, partner_id: &str) -> ProfileSnapshot {
        match self.profiles.profile(partner_id).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(partner_id, %error, "profile lookup failed, using placeholder");
                ProfileSnapshot::placeholder(partner_id)
            }
        }
    }
}
