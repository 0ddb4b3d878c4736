//! Message store adapter — the relay's only persistence boundary.
//!
//! The relay holds no authoritative copy of a message beyond the in-flight
//! broadcast payload; the store owns insertion order, and that order is
//! canonical for replay.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use parking_lot::Mutex;
use thiserror::Error;

use sanare_common::SnowflakeGenerator;

use crate::db::pool::DbPool;
use crate::db::schema::chat_messages;
use crate::models::chat_message::{ChatMessage, NewChatMessage};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("message not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => StoreError::NotFound,
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for StoreError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Operations the relay consumes from the persistent store.
///
/// `create_message` assigns the id and timestamp server-side;
/// `list_messages` returns ascending creation order, soft-deleted rows
/// included and flagged; `soft_delete` never removes the row.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_message(
        &self,
        session_id: &str,
        user_id: &str,
        display_name: &str,
        content: &str,
    ) -> Result<ChatMessage, StoreError>;

    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, StoreError>;

    async fn soft_delete(&self, message_id: i64, deleted_by: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL implementation
// ---------------------------------------------------------------------------

pub struct PgMessageStore {
    db: DbPool,
    snowflake: Arc<SnowflakeGenerator>,
}

impl PgMessageStore {
    pub fn new(db: DbPool, snowflake: Arc<SnowflakeGenerator>) -> Self {
        Self { db, snowflake }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn create_message(
        &self,
        session_id: &str,
        user_id: &str,
        display_name: &str,
        content: &str,
    ) -> Result<ChatMessage, StoreError> {
        let mut conn = self.db.get().await?;

        let id = self.snowflake.generate();
        let now = Utc::now();

        let message: ChatMessage = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(chat_messages::table)
                .values(NewChatMessage {
                    id,
                    session_id,
                    user_id,
                    display_name,
                    content,
                    created_at: now,
                    deleted: false,
                })
                .returning(ChatMessage::as_returning()),
            &mut conn,
        )
        .await?;

        Ok(message)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let mut conn = self.db.get().await?;

        let rows: Vec<ChatMessage> = diesel_async::RunQueryDsl::load(
            chat_messages::table
                .filter(chat_messages::session_id.eq(session_id))
                .order((chat_messages::created_at.asc(), chat_messages::id.asc()))
                .select(ChatMessage::as_select()),
            &mut conn,
        )
        .await?;

        Ok(rows)
    }

    async fn soft_delete(&self, message_id: i64, deleted_by: &str) -> Result<(), StoreError> {
        let mut conn = self.db.get().await?;

        let updated = diesel_async::RunQueryDsl::execute(
            diesel::update(chat_messages::table.find(message_id)).set((
                chat_messages::deleted.eq(true),
                chat_messages::deleted_by.eq(Some(deleted_by)),
            )),
            &mut conn,
        )
        .await?;

        if updated == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (local development and tests)
// ---------------------------------------------------------------------------

pub struct MemoryMessageStore {
    snowflake: SnowflakeGenerator,
    messages: Mutex<Vec<ChatMessage>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self {
            snowflake: SnowflakeGenerator::new(0),
            messages: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn create_message(
        &self,
        session_id: &str,
        user_id: &str,
        display_name: &str,
        content: &str,
    ) -> Result<ChatMessage, StoreError> {
        let message = ChatMessage {
            id: self.snowflake.generate(),
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            deleted: false,
            deleted_by: None,
        };

        self.messages.lock().push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let mut rows: Vec<ChatMessage> = self
            .messages
            .lock()
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| (m.created_at, m.id));
        Ok(rows)
    }

    async fn soft_delete(&self, message_id: i64, deleted_by: &str) -> Result<(), StoreError> {
        let mut messages = self.messages.lock();
        let message = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or(StoreError::NotFound)?;

        message.deleted = true;
        message.deleted_by = Some(deleted_by.to_string());
        Ok(())
    }
}
