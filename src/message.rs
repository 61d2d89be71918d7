//! Message protocol and persisted entities
//!
//! JSON wire format shared by clients and the store:
//! `{"message": ..., "senderName": ..., "timeSent": ...}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client → Server chat message
///
/// Any `timeSent` supplied by the client is ignored; the Room stamps
/// receipt time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMsg {
    pub message: String,
    pub sender_name: String,
}

impl IncomingMsg {
    /// Parse a text or binary frame payload
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Stamp the message with its receipt time
    pub fn stamp(self, time_sent: DateTime<Utc>) -> ChatMsg {
        ChatMsg {
            id: None,
            message: self.message,
            sender_name: self.sender_name,
            time_sent,
        }
    }
}

/// A chat message as broadcast and persisted
///
/// `id` is only present once the store has assigned one; broadcast copies
/// carry exactly the three wire fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMsg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message: String,
    pub sender_name: String,
    pub time_sent: DateTime<Utc>,
}

/// Persisted chat room
///
/// `room_pin` and `invite_code` hold hashes, never raw secrets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub room_pin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    pub url: String,
    pub time_added: DateTime<Utc>,
    #[serde(default)]
    pub chats: Vec<ChatMsg>,
}
