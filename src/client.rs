//! Room member definition
//!
//! A member is the Room's view of one connection: its ID and the channel
//! feeding that connection's writer task.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ChatMsg;
use crate::types::ClientId;

/// Outbound buffer per connection
pub const MEMBER_BUFFER_SIZE: usize = 256;

/// Connected member of a room
#[derive(Debug, Clone)]
pub struct Member {
    /// Unique identifier for this connection
    pub id: ClientId,
    /// Room → connection message channel
    pub sender: mpsc::Sender<ChatMsg>,
}

impl Member {
    /// Create a new member with the given ID and sender channel
    pub fn new(id: ClientId, sender: mpsc::Sender<ChatMsg>) -> Self {
        Self { id, sender }
    }

    /// Create a member with a fresh ID and its receiving end
    pub fn channel() -> (Self, mpsc::Receiver<ChatMsg>) {
        let (tx, rx) = mpsc::channel(MEMBER_BUFFER_SIZE);
        (Self::new(ClientId::new(), tx), rx)
    }

    /// Send a message to this member without waiting
    ///
    /// A slow member never stalls the room; a full buffer is an error.
    pub fn send(&self, msg: ChatMsg) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn msg() -> ChatMsg {
        ChatMsg {
            id: None,
            message: "hi".to_string(),
            sender_name: "A".to_string(),
            time_sent: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_member_send() {
        let (member, mut rx) = Member::channel();
        member.send(msg()).unwrap();
        assert_eq!(rx.recv().await.unwrap().message, "hi");
    }

    #[tokio::test]
    async fn test_member_send_closed() {
        let (member, rx) = Member::channel();
        drop(rx);
        assert_eq!(member.send(msg()), Err(SendError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_member_send_full() {
        let (tx, _rx) = mpsc::channel(1);
        let member = Member::new(ClientId::new(), tx);
        member.send(msg()).unwrap();
        assert_eq!(member.send(msg()), Err(SendError::Full));
    }
}
