//! In-memory message store
//!
//! Used when no database URL is configured, and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{new_id, MessageStore};
use crate::error::StoreError;
use crate::message::{ChatMsg, ChatRoom};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    rooms: RwLock<HashMap<String, ChatRoom>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn save_chat_room(&self, mut room: ChatRoom) -> Result<String, StoreError> {
        let id = new_id();
        room.id = id.clone();
        for chat in &mut room.chats {
            chat.id = Some(new_id());
        }
        self.rooms.write().await.insert(id.clone(), room);
        Ok(id)
    }

    async fn save_message(&self, room_id: &str, mut msg: ChatMsg) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))?;
        msg.id = Some(new_id());
        room.chats.push(msg);
        Ok(())
    }

    async fn chat_room(&self, room_id: &str) -> Result<Option<ChatRoom>, StoreError> {
        Ok(self.rooms.read().await.get(room_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sample_room() -> ChatRoom {
        ChatRoom {
            id: "ignored".to_string(),
            name: "Sample Chat".to_string(),
            room_pin: "pin-hash".to_string(),
            invite_code: None,
            url: "slug".to_string(),
            time_added: Utc::now(),
            chats: Vec::new(),
        }
    }

    fn sample_msg(text: &str) -> ChatMsg {
        ChatMsg {
            id: None,
            message: text.to_string(),
            sender_name: "Wisdom".to_string(),
            time_sent: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_chat_room_assigns_id() {
        let store = InMemoryStore::new();
        let id = store.save_chat_room(sample_room()).await.unwrap();

        assert!(!id.is_empty());
        assert_ne!(id, "ignored");
        let room = store.chat_room(&id).await.unwrap().unwrap();
        assert_eq!(room.id, id);
        assert_eq!(room.name, "Sample Chat");
    }

    #[tokio::test]
    async fn test_save_message_appends_history() {
        let store = InMemoryStore::new();
        let id = store.save_chat_room(sample_room()).await.unwrap();

        store.save_message(&id, sample_msg("Welcome")).await.unwrap();
        store.save_message(&id, sample_msg("Message 2")).await.unwrap();

        let room = store.chat_room(&id).await.unwrap().unwrap();
        let texts: Vec<_> = room.chats.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(texts, ["Welcome", "Message 2"]);
        assert!(room.chats.iter().all(|c| c.id.is_some()));
    }

    #[tokio::test]
    async fn test_save_message_unknown_room() {
        let store = InMemoryStore::new();
        let err = store.save_message("nope", sample_msg("hi")).await.unwrap_err();
        assert!(matches!(err, StoreError::RoomNotFound(id) if id == "nope"));
    }
}
