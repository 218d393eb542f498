//! Per-participant conversation index: unread tracking and the sidebar
//! listing.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, warn};

use parley_database::{ChatRepository, ConversationRepository, MessageRepository};

use crate::directory::{ProfileDirectory, ProfileSnapshot};
use crate::registry::RoomRegistry;
use crate::types::{ChatEvent, ChatResult, ConversationSummary};

pub struct ConversationService {
    chats: ChatRepository,
    messages: MessageRepository,
    conversations: ConversationRepository,
    profiles: Arc<dyn ProfileDirectory>,
    registry: Arc<RoomRegistry>,
}

impl ConversationService {
    pub fn new(
        pool: SqlitePool,
        profiles: Arc<dyn ProfileDirectory>,
        registry: Arc<RoomRegistry>,
    ) -> Self {
        Self {
            chats: ChatRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool),
            profiles,
            registry,
        }
    }

    /// Reset the caller's unread counter, mark the counterparty's
    /// messages seen, and notify the counterparty with a read receipt.
    /// The chat and membership are resolved by the caller beforehand.
    pub async fn mark_read(
        &self,
        chat_id: i64,
        chat_public_id: &str,
        reader_id: &str,
        partner_id: &str,
    ) -> ChatResult<()> {
        self.conversations.reset_unread(chat_id, reader_id).await?;
        let seen = self.messages.mark_seen(chat_id, reader_id).await?;

        let event = ChatEvent::ReadReceipt {
            chat_id: chat_public_id.to_string(),
            reader_id: reader_id.to_string(),
        };
        self.registry
            .send_to_participant(chat_id, partner_id, &event)
            .await;

        info!(chat_id = chat_public_id, reader_id, seen, "chat marked read");
        Ok(())
    }

    /// All of a participant's conversations, most recently updated
    /// first, with partner snapshots for rendering.
    pub async fn list_conversations(
        &self,
        participant_id: &str,
    ) -> ChatResult<Vec<ConversationSummary>> {
        let rows = self
            .conversations
            .list_for_participant(participant_id)
            .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(chat) = self.chats.find_by_id(row.chat_id).await? else {
                warn!(chat_id = row.chat_id, "conversation row without chat");
                continue;
            };

            let partner = match self.profiles.profile(&row.partner_id).await {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    warn!(partner_id = %row.partner_id, %error, "profile lookup failed, using placeholder");
                    ProfileSnapshot::placeholder(&row.partner_id)
                }
            };

            summaries.push(ConversationSummary::from_row(row, &chat, partner));
        }

        Ok(summaries)
    }
}
