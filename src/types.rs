//! Basic type definitions for the chat relay
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: UUID-based unique connection identifier
//! - `RoomId`: externally assigned room identifier (persisted room ID)
//! - `RoomInstance`: identity of one in-memory Room incarnation

use uuid::Uuid;

/// Unique client identifier (newtype pattern)
///
/// Wraps a UUID v4 for type-safe connection identification.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identifier
///
/// The ID the store assigned to a persisted chat room. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// Parse a room ID from request input
    ///
    /// Surrounding whitespace is dropped. Returns None for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a single Room incarnation
///
/// A room ID can be reused after its Room retires; the instance tells the
/// old and new Room apart when the old one deregisters itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomInstance(Uuid);

impl RoomInstance {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoomInstance {
    fn default() -> Self {
        Self::new()
    }
}
