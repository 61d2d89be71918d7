//! Multi-room WebSocket Chat Relay Library
//!
//! Clients connect to a named room over WebSocket, submit text messages and
//! receive every message submitted in that room, in the order the room
//! observed them. Messages are persisted asynchronously to a message store.
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RoomHub` maps room IDs to running rooms, creating them on first join
//! - Each `Room` is an actor owning its member set; join, leave and
//!   dispatch are serialized through its command queue
//! - Each connection has a `handler` task reading frames into its room and
//!   a writer task draining the member channel
//! - A persistence worker saves messages without ever blocking a room
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use chatroom_relay::{serve, InMemoryStore, PersistHandle, RoomHub};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:3030").await.unwrap();
//!     let persist = PersistHandle::spawn(Arc::new(InMemoryStore::new()));
//!     let hub = RoomHub::new(persist);
//!
//!     serve(listener, hub, std::future::pending()).await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod hub;
pub mod message;
pub mod persist;
pub mod registration;
pub mod room;
pub mod server;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use client::Member;
pub use error::{AppError, CreateRoomError, SendError, StoreError};
pub use handler::handle_connection;
pub use hub::RoomHub;
pub use message::{ChatMsg, ChatRoom, IncomingMsg};
pub use persist::PersistHandle;
pub use registration::{create_chat_room, CreateChatRoom, CreatedChatRoom};
pub use room::{Membership, Room, RoomHandle};
pub use server::serve;
pub use store::{open_store, InMemoryStore, MessageStore, SqliteStore};
pub use types::{ClientId, RoomId};
