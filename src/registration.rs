//! Chat room registration
//!
//! Creates the persisted chat room whose ID later names the live room.
//! Generates the action pin and URL slug, hashes the secrets with Argon2
//! and hands the room to the store.

use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use chrono::Utc;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::CreateRoomError;
use crate::message::ChatRoom;
use crate::store::MessageStore;

/// Length of the raw action pin handed to the room creator
pub const ACTION_PIN_LEN: usize = 40;

/// Length of the room URL slug
pub const ROOM_URL_LEN: usize = 25;

/// Room creation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRoom {
    pub name: String,
    #[serde(default)]
    pub invite_code: Option<String>,
}

/// Room creation response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedChatRoom {
    pub status: &'static str,
    pub message: &'static str,
    pub chatroom: ChatRoom,
    pub room_url: String,
    /// Raw pin; only its hash is stored
    pub action_pin: String,
}

/// Validate, hash and persist a new chat room
pub async fn create_chat_room(
    store: &dyn MessageStore,
    request: CreateChatRoom,
) -> Result<CreatedChatRoom, CreateRoomError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(CreateRoomError::InvalidPayload("name is required"));
    }

    let invite_code = match request.invite_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Some(hash_secret(&code.to_lowercase())?),
        _ => None,
    };

    let action_pin = random_alphanumeric(ACTION_PIN_LEN);
    let mut chatroom = ChatRoom {
        id: String::new(),
        name: name.to_string(),
        room_pin: hash_secret(&action_pin)?,
        invite_code,
        url: random_alphanumeric(ROOM_URL_LEN),
        time_added: Utc::now(),
        chats: Vec::new(),
    };

    chatroom.id = store
        .save_chat_room(chatroom.clone())
        .await
        .inspect_err(|e| error!("Failed to save chatroom: {}", e))?;
    info!(room_id = %chatroom.id, name = %chatroom.name, "Chatroom created");

    Ok(CreatedChatRoom {
        status: "success",
        message: "Chat room created successfully !",
        room_url: chatroom.url.clone(),
        chatroom,
        action_pin,
    })
}

fn hash_secret(secret: &str) -> Result<String, CreateRoomError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CreateRoomError::Hash(e.to_string()))
}

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
