//! SQLite-backed message store
//!
//! Rooms live in `chat_rooms`, history in `chat_messages` ordered by an
//! autoincrement sequence. The schema is created on connect.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::{new_id, MessageStore};
use crate::error::StoreError;
use crate::message::{ChatMsg, ChatRoom};

/// Pool size for file-backed databases
const MAX_CONNECTIONS: u32 = 5;

const CREATE_ROOMS: &str = "CREATE TABLE IF NOT EXISTS chat_rooms (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    room_pin    TEXT NOT NULL,
    invite_code TEXT,
    url         TEXT NOT NULL,
    time_added  TEXT NOT NULL
)";

const CREATE_MESSAGES: &str = "CREATE TABLE IF NOT EXISTS chat_messages (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    id          TEXT NOT NULL UNIQUE,
    room_id     TEXT NOT NULL REFERENCES chat_rooms(id),
    message     TEXT NOT NULL,
    sender_name TEXT NOT NULL,
    time_sent   TEXT NOT NULL
)";

type RoomRow = (String, String, String, Option<String>, String, DateTime<Utc>);
type MsgRow = (String, String, String, DateTime<Utc>);

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `url` and ensure the schema exists.
    ///
    /// `sqlite::memory:` URLs get a single, never-recycled connection so the
    /// database survives for the lifetime of the store.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_with(options)
                .await?
        };

        sqlx::query(CREATE_ROOMS).execute(&pool).await?;
        sqlx::query(CREATE_MESSAGES).execute(&pool).await?;
        info!(url, "Message store ready");

        Ok(Self { pool })
    }

    async fn insert_message(&self, room_id: &str, msg: &ChatMsg) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO chat_messages (id, room_id, message, sender_name, time_sent)
             SELECT ?, ?, ?, ?, ?
             WHERE EXISTS (SELECT 1 FROM chat_rooms WHERE id = ?)",
        )
        .bind(new_id())
        .bind(room_id)
        .bind(&msg.message)
        .bind(&msg.sender_name)
        .bind(msg.time_sent)
        .bind(room_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn save_chat_room(&self, room: ChatRoom) -> Result<String, StoreError> {
        let id = new_id();
        sqlx::query(
            "INSERT INTO chat_rooms (id, name, room_pin, invite_code, url, time_added)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&room.name)
        .bind(&room.room_pin)
        .bind(&room.invite_code)
        .bind(&room.url)
        .bind(room.time_added)
        .execute(&self.pool)
        .await?;

        for chat in &room.chats {
            self.insert_message(&id, chat).await?;
        }
        Ok(id)
    }

    async fn save_message(&self, room_id: &str, msg: ChatMsg) -> Result<(), StoreError> {
        if self.insert_message(room_id, &msg).await? == 0 {
            return Err(StoreError::RoomNotFound(room_id.to_string()));
        }
        Ok(())
    }

    async fn chat_room(&self, room_id: &str) -> Result<Option<ChatRoom>, StoreError> {
        let Some((id, name, room_pin, invite_code, url, time_added)) = sqlx::query_as::<_, RoomRow>(
            "SELECT id, name, room_pin, invite_code, url, time_added FROM chat_rooms WHERE id = ?",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let chats = sqlx::query_as::<_, MsgRow>(
            "SELECT id, message, sender_name, time_sent FROM chat_messages
             WHERE room_id = ? ORDER BY seq",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(id, message, sender_name, time_sent)| ChatMsg {
            id: Some(id),
            message,
            sender_name,
            time_sent,
        })
        .collect();

        Ok(Some(ChatRoom {
            id,
            name,
            room_pin,
            invite_code,
            url,
            time_added,
            chats,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn sample_room(chats: Vec<ChatMsg>) -> ChatRoom {
        ChatRoom {
            id: String::new(),
            name: "Sample Chat".to_string(),
            room_pin: "pin-hash".to_string(),
            invite_code: Some("invite-hash".to_string()),
            url: "slug".to_string(),
            time_added: Utc::now(),
            chats,
        }
    }

    fn sample_msg(text: &str, sender: &str) -> ChatMsg {
        ChatMsg {
            id: None,
            message: text.to_string(),
            sender_name: sender.to_string(),
            time_sent: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_empty_room() {
        let store = memory_store().await;
        let id = store.save_chat_room(sample_room(Vec::new())).await.unwrap();
        assert!(!id.is_empty());

        let room = store.chat_room(&id).await.unwrap().unwrap();
        assert_eq!(room.name, "Sample Chat");
        assert_eq!(room.invite_code.as_deref(), Some("invite-hash"));
        assert!(room.chats.is_empty());
    }

    #[tokio::test]
    async fn test_save_room_with_history() {
        let store = memory_store().await;
        let chats = vec![
            sample_msg("Welcome", "Wisdom Matt"),
            sample_msg("Message 2", "Wisdom Matthew"),
        ];
        let id = store.save_chat_room(sample_room(chats)).await.unwrap();

        let room = store.chat_room(&id).await.unwrap().unwrap();
        assert_eq!(room.chats.len(), 2);
        assert_eq!(room.chats[0].message, "Welcome");
        assert_eq!(room.chats[1].sender_name, "Wisdom Matthew");
    }

    #[tokio::test]
    async fn test_save_message_order() {
        let store = memory_store().await;
        let id = store.save_chat_room(sample_room(Vec::new())).await.unwrap();

        for i in 0..5 {
            store
                .save_message(&id, sample_msg(&format!("m{i}"), "A"))
                .await
                .unwrap();
        }

        let room = store.chat_room(&id).await.unwrap().unwrap();
        let texts: Vec<_> = room.chats.iter().map(|c| c.message.clone()).collect();
        assert_eq!(texts, ["m0", "m1", "m2", "m3", "m4"]);
        assert!(room.chats.iter().all(|c| c.id.is_some()));
    }

    #[tokio::test]
    async fn test_save_message_unknown_room() {
        let store = memory_store().await;
        let err = store
            .save_message("missing", sample_msg("hi", "A"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_room_is_none() {
        let store = memory_store().await;
        assert!(store.chat_room("missing").await.unwrap().is_none());
    }
}
