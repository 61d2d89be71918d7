//! Persistence worker
//!
//! Rooms hand every broadcast message to this worker and move on. Each save
//! runs as its own task so rooms never wait on the store. A room has at most
//! one save in flight and the rest wait in its queue, so history is stored
//! in broadcast order while different rooms save concurrently. Failures are
//! logged only.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::message::ChatMsg;
use crate::store::MessageStore;
use crate::types::RoomId;

/// Commands accepted by the persistence worker
#[derive(Debug)]
enum PersistCommand {
    Save { room_id: RoomId, msg: ChatMsg },
    Shutdown {
        timeout: Duration,
        done: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to the persistence worker
#[derive(Debug, Clone)]
pub struct PersistHandle {
    sender: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistHandle {
    /// Start the worker on the current runtime
    pub fn spawn(store: Arc<dyn MessageStore>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(Persister::new(store, receiver).run());
        Self { sender }
    }

    /// Queue a message for saving. Never waits.
    ///
    /// Returns false once the worker has shut down.
    pub fn save(&self, room_id: RoomId, msg: ChatMsg) -> bool {
        self.sender
            .send(PersistCommand::Save { room_id, msg })
            .is_ok()
    }

    /// Stop accepting saves and wait up to `timeout` for queued ones.
    ///
    /// Returns the number of messages left unsaved at the deadline.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let (done, rx) = oneshot::channel();
        if self
            .sender
            .send(PersistCommand::Shutdown { timeout, done })
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

struct Persister {
    store: Arc<dyn MessageStore>,
    receiver: mpsc::UnboundedReceiver<PersistCommand>,
    in_flight: JoinSet<RoomId>,
    /// Saves waiting behind the in-flight save of the same room. A room has
    /// an entry exactly while one of its saves is running.
    queued: HashMap<RoomId, VecDeque<ChatMsg>>,
}

impl Persister {
    fn new(store: Arc<dyn MessageStore>, receiver: mpsc::UnboundedReceiver<PersistCommand>) -> Self {
        Self {
            store,
            receiver,
            in_flight: JoinSet::new(),
            queued: HashMap::new(),
        }
    }

    async fn run(mut self) {
        debug!("Persistence worker started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(PersistCommand::Save { room_id, msg }) => self.enqueue(room_id, msg),
                    Some(PersistCommand::Shutdown { timeout, done }) => {
                        let dropped = self.drain(timeout).await;
                        let _ = done.send(dropped);
                        return;
                    }
                    None => {
                        // Every handle is gone; finish what is queued.
                        while let Some(joined) = self.in_flight.join_next().await {
                            self.finish(joined);
                        }
                        debug!("Persistence worker stopped");
                        return;
                    }
                },
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.finish(joined);
                }
            }
        }
    }

    fn enqueue(&mut self, room_id: RoomId, msg: ChatMsg) {
        match self.queued.get_mut(&room_id) {
            Some(queue) => queue.push_back(msg),
            None => {
                self.queued.insert(room_id.clone(), VecDeque::new());
                self.spawn_save(room_id, msg);
            }
        }
    }

    /// Start the room's next queued save, or mark the room idle
    fn finish(&mut self, joined: Result<RoomId, JoinError>) {
        let room_id = match joined {
            Ok(room_id) => room_id,
            Err(e) => {
                error!("Save task failed: {}", e);
                return;
            }
        };

        match self.queued.get_mut(&room_id).and_then(VecDeque::pop_front) {
            Some(msg) => self.spawn_save(room_id, msg),
            None => {
                self.queued.remove(&room_id);
            }
        }
    }

    fn spawn_save(&mut self, room_id: RoomId, msg: ChatMsg) {
        let store = Arc::clone(&self.store);
        self.in_flight.spawn(async move {
            match store.save_message(room_id.as_str(), msg).await {
                Ok(()) => debug!(room_id = %room_id, "Chat message saved"),
                Err(e) => error!(room_id = %room_id, "Save chat message error: {}", e),
            }
            room_id
        });
    }

    fn pending(&self) -> usize {
        self.in_flight.len() + self.queued.values().map(VecDeque::len).sum::<usize>()
    }

    async fn drain(&mut self, timeout: Duration) -> usize {
        self.receiver.close();
        while let Ok(cmd) = self.receiver.try_recv() {
            if let PersistCommand::Save { room_id, msg } = cmd {
                self.enqueue(room_id, msg);
            }
        }

        info!("Draining {} pending message saves", self.pending());

        let drained = tokio::time::timeout(timeout, async {
            while let Some(joined) = self.in_flight.join_next().await {
                self.finish(joined);
            }
        })
        .await;

        if drained.is_err() {
            let dropped = self.pending();
            warn!("Abandoning {} message saves after {:?}", dropped, timeout);
            self.in_flight.abort_all();
            self.queued.clear();
            dropped
        } else {
            0
        }
    }
}
