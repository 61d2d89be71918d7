//! Error types for the chat relay
//!
//! Defines connection-level errors, member send errors, store errors and
//! room-creation errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Connection-level errors
///
/// Any of these ends the connection's reader loop. None of them reaches
/// the Room or the Hub beyond the resulting Leave.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Malformed inbound payload
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Request carried no usable room ID
    #[error("Missing room id")]
    MissingRoomId,

    /// The Room retired before the join was processed
    #[error("Room retired: {0}")]
    RoomRetired(String),
}

/// Message send errors
///
/// Occurs when the Room cannot hand a message to one member.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The member's outbound buffer is full
    #[error("Outbound buffer full")]
    Full,
}

/// Message store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// No persisted chat room has this ID
    #[error("Chat room not found: {0}")]
    RoomNotFound(String),

    /// Database backend failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Room creation errors
#[derive(Debug, Error)]
pub enum CreateRoomError {
    /// Payload failed validation
    #[error("Invalid payload: {0}")]
    InvalidPayload(&'static str),

    /// Secret hashing failed
    #[error("Hashing failed: {0}")]
    Hash(String),

    /// Store rejected the room
    #[error(transparent)]
    Store(#[from] StoreError),
}
