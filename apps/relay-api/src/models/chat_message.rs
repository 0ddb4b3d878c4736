use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::chat_messages;

/// A persisted chat message. `(id, session_id, user_id, content, created_at)`
/// never changes after insert; only the soft-delete columns do.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = chat_messages)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: String,
    pub user_id: String,
    pub display_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub deleted: bool,
    pub deleted_by: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = chat_messages)]
pub struct NewChatMessage<'a> {
    pub id: i64,
    pub session_id: &'a str,
    pub user_id: &'a str,
    pub display_name: &'a str,
    pub content: &'a str,
    pub created_at: DateTime<Utc>,
    pub deleted: bool,
}
