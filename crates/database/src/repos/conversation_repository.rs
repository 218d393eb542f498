//! Repository for conversation summary data access operations.

use sqlx::{Row, SqlitePool};

use crate::entities::ConversationRow;
use crate::types::StoreResult;

const PREVIEW_MAX_CHARS: usize = 120;

/// Repository for the per-participant conversation projection
#[derive(Clone)]
pub struct ConversationRepository {
    pool: SqlitePool,
}

impl ConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Make sure a summary row exists for a participant. Called when a
    /// chat is first created so both sidebars show the conversation even
    /// before any message is sent.
    pub async fn ensure(
        &self,
        chat_id: i64,
        order_id: &str,
        participant_id: &str,
        partner_id: &str,
    ) -> StoreResult<()> {
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO conversations (chat_id, participant_id, order_id, partner_id, unread_count, updated_at)
             VALUES (?, ?, ?, ?, 0, ?)
             ON CONFLICT(chat_id, participant_id) DO NOTHING",
        )
        .bind(chat_id)
        .bind(participant_id)
        .bind(order_id)
        .bind(partner_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fold a freshly appended message into a participant's summary.
    /// `bump_unread` is false for the sender's own row and for a
    /// recipient who is actively viewing the chat.
    pub async fn record_message(
        &self,
        chat_id: i64,
        order_id: &str,
        participant_id: &str,
        partner_id: &str,
        sender_id: &str,
        content: &str,
        bump_unread: bool,
    ) -> StoreResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let preview: String = content.chars().take(PREVIEW_MAX_CHARS).collect();
        let bump = i64::from(bump_unread);

        sqlx::query(
            "INSERT INTO conversations
                 (chat_id, participant_id, order_id, partner_id, last_message_preview, last_sender_id, unread_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(chat_id, participant_id) DO UPDATE SET
                 last_message_preview = excluded.last_message_preview,
                 last_sender_id = excluded.last_sender_id,
                 unread_count = conversations.unread_count + ?7,
                 updated_at = excluded.updated_at",
        )
        .bind(chat_id)
        .bind(participant_id)
        .bind(order_id)
        .bind(partner_id)
        .bind(&preview)
        .bind(sender_id)
        .bind(bump)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reset a participant's unread counter after an explicit mark-read.
    pub async fn reset_unread(&self, chat_id: i64, participant_id: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE conversations SET unread_count = 0 WHERE chat_id = ? AND participant_id = ?",
        )
        .bind(chat_id)
        .bind(participant_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_for_participant(
        &self,
        participant_id: &str,
    ) -> StoreResult<Vec<ConversationRow>> {
        let rows = sqlx::query(
            "SELECT chat_id, participant_id, order_id, partner_id, last_message_preview,
                    last_sender_id, unread_count, updated_at
             FROM conversations WHERE participant_id = ? ORDER BY updated_at DESC",
        )
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_conversation).collect()
    }

    pub async fn find(
        &self,
        chat_id: i64,
        participant_id: &str,
    ) -> StoreResult<Option<ConversationRow>> {
        let row = sqlx::query(
            "SELECT chat_id, participant_id, order_id, partner_id, last_message_preview,
                    last_sender_id, unread_count, updated_at
             FROM conversations WHERE chat_id = ? AND participant_id = ?",
        )
        .bind(chat_id)
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_conversation).transpose()
    }
}

fn map_conversation(row: sqlx::sqlite::SqliteRow) -> StoreResult<ConversationRow> {
    Ok(ConversationRow {
        chat_id: row.try_get("chat_id")?,
        participant_id: row.try_get("participant_id")?,
        order_id: row.try_get("order_id")?,
        partner_id: row.try_get("partner_id")?,
        last_message_preview: row.try_get("last_message_preview")?,
        last_sender_id: row.try_get("last_sender_id")?,
        unread_count: row.try_get("unread_count")?,
        updated_at: row.try_get("updated_at")?,
    })
}
