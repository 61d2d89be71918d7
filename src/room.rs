//! Room actor implementation
//!
//! One task per active room owns the member set. Join, leave and dispatch
//! all arrive through a single command queue, so the member set is never
//! touched from outside the room's own event loop.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::client::Member;
use crate::error::AppError;
use crate::hub::RoomHub;
use crate::message::IncomingMsg;
use crate::persist::PersistHandle;
use crate::types::{ClientId, RoomId, RoomInstance};

/// Commands processed by a Room's event loop, in arrival order
#[derive(Debug)]
pub enum RoomCommand {
    /// Add a member; `ack` is answered once the member is in the set
    Join {
        member: Member,
        ack: oneshot::Sender<()>,
    },
    /// Remove a member (no-op if absent)
    Leave { client_id: ClientId },
    /// Broadcast a message to every member
    Dispatch { msg: IncomingMsg },
    /// Report the current member count
    MemberCount { reply: oneshot::Sender<usize> },
}

/// Cloneable address of a running Room
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: RoomId,
    instance: RoomInstance,
    sender: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn instance(&self) -> RoomInstance {
        self.instance
    }

    /// Whether the Room's event loop has exited
    pub fn is_retired(&self) -> bool {
        self.sender.is_closed()
    }

    /// Join the room, returning a guard that leaves on drop
    ///
    /// Fails with [`AppError::RoomRetired`] if the room retired before the
    /// join was processed.
    pub async fn join(&self, member: Member) -> Result<Membership, AppError> {
        let client_id = member.id;
        let (ack, joined) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join { member, ack })
            .map_err(|_| AppError::RoomRetired(self.id.to_string()))?;
        joined
            .await
            .map_err(|_| AppError::RoomRetired(self.id.to_string()))?;

        Ok(Membership {
            room: self.clone(),
            client_id,
        })
    }

    /// Queue a message for broadcast
    pub fn dispatch(&self, msg: IncomingMsg) -> Result<(), AppError> {
        self.sender
            .send(RoomCommand::Dispatch { msg })
            .map_err(|_| AppError::ChannelSend)
    }

    /// Current member count, or None once retired
    pub async fn member_count(&self) -> Option<usize> {
        let (reply, count) = oneshot::channel();
        self.sender.send(RoomCommand::MemberCount { reply }).ok()?;
        count.await.ok()
    }

    fn leave(&self, client_id: ClientId) {
        let _ = self.sender.send(RoomCommand::Leave { client_id });
    }
}

/// Proof of membership in one room
///
/// Dropping it sends exactly one Leave, however the connection ended.
#[derive(Debug)]
pub struct Membership {
    room: RoomHandle,
    client_id: ClientId,
}

impl Membership {
    pub fn room(&self) -> &RoomHandle {
        &self.room
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Leave the room now
    pub fn leave(self) {}
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.room.leave(self.client_id);
    }
}

/// Chat room actor
///
/// Active while its event loop runs. Retires (deregisters from the hub and
/// exits) on the leave that empties the member set.
pub struct Room {
    id: RoomId,
    instance: RoomInstance,
    members: HashMap<ClientId, Member>,
    receiver: mpsc::UnboundedReceiver<RoomCommand>,
    hub: RoomHub,
    persist: PersistHandle,
    last_time_sent: Option<DateTime<Utc>>,
}

impl Room {
    /// Create a room and its handle. The caller spawns [`Room::run`].
    pub fn new(id: RoomId, hub: RoomHub, persist: PersistHandle) -> (Self, RoomHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let instance = RoomInstance::new();
        let handle = RoomHandle {
            id: id.clone(),
            instance,
            sender,
        };
        let room = Self {
            id,
            instance,
            members: HashMap::new(),
            receiver,
            hub,
            persist,
            last_time_sent: None,
        };
        (room, handle)
    }

    /// Run the room event loop until it retires
    pub async fn run(mut self) {
        info!(room_id = %self.id, "Room started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join { member, ack } => self.handle_join(member, ack),
                RoomCommand::Leave { client_id } => {
                    if self.handle_leave(client_id) {
                        self.hub.remove(&self.id, self.instance).await;
                        break;
                    }
                }
                RoomCommand::Dispatch { msg } => self.handle_dispatch(msg),
                RoomCommand::MemberCount { reply } => {
                    let _ = reply.send(self.members.len());
                }
            }
        }

        info!(room_id = %self.id, "Room retired");
    }

    fn handle_join(&mut self, member: Member, ack: oneshot::Sender<()>) {
        let client_id = member.id;
        self.members.insert(client_id, member);
        info!(room_id = %self.id, client_id = %client_id, "New client joining");
        debug!(room_id = %self.id, "Members: {}", self.members.len());
        let _ = ack.send(());
    }

    /// Returns true if the room is now empty and should retire
    fn handle_leave(&mut self, client_id: ClientId) -> bool {
        if self.members.remove(&client_id).is_none() {
            return false;
        }
        info!(room_id = %self.id, client_id = %client_id, "Client leaving");
        self.members.is_empty()
    }

    fn handle_dispatch(&mut self, msg: IncomingMsg) {
        let msg = msg.stamp(self.next_time_sent());
        info!(
            room_id = %self.id,
            sender = %msg.sender_name,
            "New chat message received"
        );

        for member in self.members.values() {
            if let Err(e) = member.send(msg.clone()) {
                warn!(
                    room_id = %self.id,
                    client_id = %member.id,
                    "Broadcast chat message error: {}", e
                );
            }
        }
        debug!(room_id = %self.id, "Message broadcast to {} members", self.members.len());

        if !self.persist.save(self.id.clone(), msg) {
            warn!(room_id = %self.id, "Persistence worker stopped, message not saved");
        }
    }

    /// Receipt time, never earlier than the previous one
    fn next_time_sent(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let time_sent = match self.last_time_sent {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_time_sent = Some(time_sent);
        time_sent
    }
}
