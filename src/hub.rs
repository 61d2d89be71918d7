//! Room hub
//!
//! Registry of active rooms keyed by room ID. Rooms are created on the first
//! join for an unseen ID and deregister themselves when they empty. The map
//! is the only shared state in the relay and sits behind a single mutex, so
//! get-or-create is atomic.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::client::Member;
use crate::persist::PersistHandle;
use crate::room::{Membership, Room, RoomHandle};
use crate::types::{RoomId, RoomInstance};

/// Registry and factory for rooms
#[derive(Debug, Clone)]
pub struct RoomHub {
    rooms: Arc<Mutex<HashMap<RoomId, RoomHandle>>>,
    persist: PersistHandle,
}

impl RoomHub {
    pub fn new(persist: PersistHandle) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            persist,
        }
    }

    /// Return the active room for `room_id`, starting one if needed
    ///
    /// A room only retires on the leave that empties it, so the caller must
    /// join the returned room. Outside the crate, use [`RoomHub::join`].
    pub(crate) async fn get_or_create(&self, room_id: &RoomId) -> RoomHandle {
        let mut rooms = self.rooms.lock().await;

        if let Some(handle) = rooms.get(room_id) {
            if !handle.is_retired() {
                return handle.clone();
            }
        }

        let (room, handle) = Room::new(room_id.clone(), self.clone(), self.persist.clone());
        tokio::spawn(room.run());
        rooms.insert(room_id.clone(), handle.clone());

        info!(room_id = %room_id, "Room created");
        debug!("Active rooms: {}", rooms.len());
        handle
    }

    /// Join `member` to the room for `room_id`, starting the room if needed
    ///
    /// A join that lands on a room in the middle of retiring is retried
    /// against a fresh room, so the joiner is never lost.
    pub async fn join(&self, room_id: &RoomId, member: Member) -> Membership {
        loop {
            let room = self.get_or_create(room_id).await;
            match room.join(member.clone()).await {
                Ok(membership) => return membership,
                Err(e) => debug!(room_id = %room_id, "Retrying join: {}", e),
            }
        }
    }

    /// Deregister a room
    ///
    /// Only removes the entry if it is still the same room instance; a
    /// newer room registered under the same ID is left alone.
    pub async fn remove(&self, room_id: &RoomId, instance: RoomInstance) -> bool {
        let mut rooms = self.rooms.lock().await;

        let is_same = rooms
            .get(room_id)
            .is_some_and(|handle| handle.instance() == instance);
        if is_same {
            rooms.remove(room_id);
            debug!(room_id = %room_id, "Room removed from hub");
            debug!("Active rooms: {}", rooms.len());
        }
        is_same
    }

    /// Active room for `room_id`, if any
    pub async fn get(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms.lock().await.get(room_id).cloned()
    }

    /// Number of registered rooms
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::message::IncomingMsg;
    use crate::store::{InMemoryStore, MessageStore};

    const WAIT: Duration = Duration::from_secs(2);

    fn test_hub() -> RoomHub {
        let store: Arc<dyn MessageStore> = Arc::new(InMemoryStore::new());
        RoomHub::new(PersistHandle::spawn(store))
    }

    fn room_id(id: &str) -> RoomId {
        RoomId::parse(id).unwrap()
    }

    async fn wait_until_removed(hub: &RoomHub, id: &RoomId) {
        timeout(WAIT, async {
            while hub.get(id).await.is_some() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_room() {
        let hub = test_hub();
        let first = hub.get_or_create(&room_id("R1")).await;
        let second = hub.get_or_create(&room_id("R1")).await;
        let other = hub.get_or_create(&room_id("R2")).await;

        assert_eq!(first.instance(), second.instance());
        assert_ne!(first.instance(), other.instance());
        assert_eq!(hub.room_count().await, 2);

        for room in [first, other] {
            let (member, _rx) = Member::channel();
            room.join(member).await.unwrap().leave();
            wait_until_removed(&hub, room.id()).await;
        }
        assert_eq!(hub.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_first_joins_share_one_room() {
        let hub = test_hub();
        let id = room_id("fresh");

        let mut tasks = Vec::new();
        for _ in 0..50 {
            let hub = hub.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                let (member, rx) = Member::channel();
                let membership = hub.join(&id, member).await;
                (membership, rx)
            }));
        }

        let mut joined = Vec::new();
        for task in tasks {
            joined.push(task.await.unwrap());
        }

        let instances: HashSet<_> = joined
            .iter()
            .map(|(m, _)| m.room().instance())
            .collect();
        assert_eq!(instances.len(), 1);
        assert_eq!(hub.room_count().await, 1);

        let room = hub.get(&id).await.unwrap();
        assert_eq!(room.member_count().await, Some(50));

        room.dispatch(IncomingMsg {
            message: "all".to_string(),
            sender_name: "A".to_string(),
        })
        .unwrap();
        for (_, rx) in &mut joined {
            let msg = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            assert_eq!(msg.message, "all");
        }
    }

    #[tokio::test]
    async fn test_rejoin_after_retire_starts_empty_room() {
        let hub = test_hub();
        let id = room_id("R1");

        let (a, _rx_a) = Member::channel();
        let membership = hub.join(&id, a).await;
        let old_instance = membership.room().instance();
        membership.leave();
        wait_until_removed(&hub, &id).await;

        let (b, _rx_b) = Member::channel();
        let membership = hub.join(&id, b).await;
        let room = membership.room().clone();
        assert_ne!(room.instance(), old_instance);
        assert_eq!(room.member_count().await, Some(1));

        membership.leave();
        wait_until_removed(&hub, &id).await;
        timeout(WAIT, async {
            while !room.is_retired() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_remove_is_guarded_by_instance() {
        let hub = test_hub();
        let id = room_id("R1");
        let (a, _rx_a) = Member::channel();
        let membership = hub.join(&id, a).await;
        let room = membership.room().clone();

        assert!(!hub.remove(&id, RoomInstance::new()).await);
        assert!(hub.get(&id).await.is_some());

        assert!(hub.remove(&id, room.instance()).await);
        assert!(!hub.remove(&id, room.instance()).await);
        assert!(hub.get(&id).await.is_none());

        // Already deregistered; the last leave still ends the room
        membership.leave();
        timeout(WAIT, async {
            while !room.is_retired() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_join_survives_retiring_room() {
        let hub = test_hub();
        let id = room_id("R1");

        for _ in 0..20 {
            let (a, _rx_a) = Member::channel();
            let first = hub.join(&id, a).await;
            first.leave();

            let (b, mut rx_b) = Member::channel();
            let second = hub.join(&id, b).await;
            assert!(!second.room().is_retired());

            second.room().dispatch(IncomingMsg {
                message: "ping".to_string(),
                sender_name: "B".to_string(),
            })
            .unwrap();
            let msg = timeout(WAIT, rx_b.recv()).await.unwrap().unwrap();
            assert_eq!(msg.message, "ping");

            second.leave();
            wait_until_removed(&hub, &id).await;
        }
    }
}
