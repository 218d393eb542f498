//! Repository for message data access operations.

use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::entities::{NewMessage, StoredMessage};
use crate::types::{StoreError, StoreResult};

/// A single page of backward history plus the cursor for the next
/// (older) page. `messages` is ordered oldest-to-newest.
#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<StoredMessage>,
    pub next_cursor: Option<i64>,
}

/// Repository for message database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message, assigning the next per-chat sequence number.
    ///
    /// The sequence is computed by a subselect inside the INSERT, so the
    /// read and the write are one atomic statement; concurrent sends to
    /// the same chat serialize here and nowhere else. The UNIQUE
    /// (chat_id, seq) constraint backstops the invariant.
    pub async fn append(&self, new: &NewMessage) -> StoreResult<StoredMessage> {
        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO messages (public_id, chat_id, sender_id, content, seq, delivered, seen, created_at)
             VALUES (?1, ?2, ?3, ?4,
                     (SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE chat_id = ?2),
                     ?5, 0, ?6)",
        )
        .bind(&public_id)
        .bind(new.chat_id)
        .bind(&new.sender_id)
        .bind(&new.content)
        .bind(new.delivered)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let message_id = result.last_insert_rowid();

        let message = self
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| StoreError::row_not_found("message", message_id.to_string()))?;

        info!(
            message_id,
            public_id = %message.public_id,
            chat_id = new.chat_id,
            seq = message.seq,
            "appended message"
        );

        Ok(message)
    }

    /// Fetch the `limit` newest messages older than `before_seq` (all
    /// messages when `None`), oldest-to-newest. Anchoring on `seq` keeps
    /// repeated fetches stable while new messages are appended.
    pub async fn page_before(
        &self,
        chat_id: i64,
        before_seq: Option<i64>,
        limit: i64,
    ) -> StoreResult<MessagePage> {
        // One extra row tells us whether an older page exists.
        let probe = limit + 1;

        let rows = match before_seq {
            Some(cursor) => {
                sqlx::query(
                    "SELECT id, public_id, chat_id, sender_id, content, seq, delivered, seen, created_at
                     FROM messages WHERE chat_id = ? AND seq < ? ORDER BY seq DESC LIMIT ?",
                )
                .bind(chat_id)
                .bind(cursor)
                .bind(probe)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, public_id, chat_id, sender_id, content, seq, delivered, seen, created_at
                     FROM messages WHERE chat_id = ? ORDER BY seq DESC LIMIT ?",
                )
                .bind(chat_id)
                .bind(probe)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut messages = rows
            .into_iter()
            .map(map_message)
            .collect::<StoreResult<Vec<_>>>()?;

        let has_older = messages.len() as i64 > limit;
        if has_older {
            messages.truncate(limit as usize);
        }

        messages.reverse();

        let next_cursor = if has_older {
            messages.first().map(|m| m.seq)
        } else {
            None
        };

        Ok(MessagePage {
            messages,
            next_cursor,
        })
    }

    pub async fn find_by_id(&self, id: i64) -> StoreResult<Option<StoredMessage>> {
        let row = sqlx::query(
            "SELECT id, public_id, chat_id, sender_id, content, seq, delivered, seen, created_at
             FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_message).transpose()
    }

    /// Mark every message the counterparty sent as seen. Used by
    /// mark-read; the reader's own messages are untouched.
    pub async fn mark_seen(&self, chat_id: i64, reader_id: &str) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET seen = 1 WHERE chat_id = ? AND sender_id != ? AND seen = 0",
        )
        .bind(chat_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn latest_seq(&self, chat_id: i64) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COALESCE(MAX(seq), 0) AS seq FROM messages WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("seq")?)
    }
}

fn map_message(row: sqlx::sqlite::SqliteRow) -> StoreResult<StoredMessage> {
    Ok(StoredMessage {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        chat_id: row.try_get("chat_id")?,
        sender_id: row.try_get("sender_id")?,
        content: row.try_get("content")?,
        seq: row.try_get("seq")?,
        delivered: row.try_get("delivered")?,
        seen: row.try_get("seen")?,
        created_at: row.try_get("created_at")?,
    })
}
