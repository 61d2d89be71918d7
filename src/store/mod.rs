//! Message store seam
//!
//! Durable persistence for chat rooms and their message history. The store
//! is shared by every Room as `Arc<dyn MessageStore>` and must accept
//! concurrent, independent calls.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{ChatMsg, ChatRoom};

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new chat room, returning the ID assigned to it.
    ///
    /// Any ID already set on `room` is replaced.
    async fn save_chat_room(&self, room: ChatRoom) -> Result<String, StoreError>;

    /// Append a message to a persisted room's history.
    ///
    /// Fails with [`StoreError::RoomNotFound`] when `room_id` is unknown.
    async fn save_message(&self, room_id: &str, msg: ChatMsg) -> Result<(), StoreError>;

    /// Load a room together with its history in persistence order.
    async fn chat_room(&self, room_id: &str) -> Result<Option<ChatRoom>, StoreError>;
}

/// Open the configured store
///
/// A SQLite URL selects [`SqliteStore`]; no URL selects [`InMemoryStore`].
pub async fn open_store(database_url: Option<&str>) -> Result<Arc<dyn MessageStore>, StoreError> {
    match database_url {
        Some(url) => Ok(Arc::new(SqliteStore::connect(url).await?)),
        None => Ok(Arc::new(InMemoryStore::new())),
    }
}

/// Fresh store-assigned identifier
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
