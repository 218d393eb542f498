//! Repository for chat room data access operations.

use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::entities::ChatRoom;
use crate::types::{StoreError, StoreResult};

/// Repository for chat room database operations
#[derive(Clone)]
pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the chat room for an order. The UNIQUE constraint on
    /// `order_id` makes concurrent first-joins collapse onto one row; on
    /// conflict the existing row is returned.
    pub async fn create_for_order(
        &self,
        order_id: &str,
        requester_id: &str,
        provider_id: &str,
    ) -> StoreResult<ChatRoom> {
        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO chats (public_id, order_id, requester_id, provider_id, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(order_id) DO NOTHING",
        )
        .bind(&public_id)
        .bind(order_id)
        .bind(requester_id)
        .bind(provider_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(order_id, public_id = %public_id, "created chat room");
        }

        self.find_by_order_id(order_id)
            .await?
            .ok_or_else(|| StoreError::row_not_found("chat", order_id))
    }

    pub async fn find_by_order_id(&self, order_id: &str) -> StoreResult<Option<ChatRoom>> {
        let row = sqlx::query(
            "SELECT id, public_id, order_id, requester_id, provider_id, created_at
             FROM chats WHERE order_id = ?",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_chat).transpose()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> StoreResult<Option<ChatRoom>> {
        let row = sqlx::query(
            "SELECT id, public_id, order_id, requester_id, provider_id, created_at
             FROM chats WHERE public_id = ?",
        )
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_chat).transpose()
    }

    pub async fn find_by_id(&self, id: i64) -> StoreResult<Option<ChatRoom>> {
        let row = sqlx::query(
            "SELECT id, public_id, order_id, requester_id, provider_id, created_at
             FROM chats WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_chat).transpose()
    }
}

fn map_chat(row: sqlx::sqlite::SqliteRow) -> StoreResult<ChatRoom> {
    Ok(ChatRoom {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        order_id: row.try_get("order_id")?,
        requester_id: row.try_get("requester_id")?,
        provider_id: row.try_get("provider_id")?,
        created_at: row.try_get("created_at")?,
    })
}
