/* ------------ 每間房一個 fan-out 迴圈，peers 只由迴圈本身改動 ------------ */
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::room::Role;

/// Per-connection outbound queue depth. A peer this far behind is evicted.
pub const SEND_QUEUE: usize = 256;
/// Pending events per room loop.
pub const MAILBOX: usize = 256;

pub type Frame = Arc<str>;

/// Delivery endpoint of one connection, as seen by its room loop.
pub struct Peer {
    pub id:      Uuid,
    pub user_id: String,
    pub role:    Role,
    pub tx:      mpsc::Sender<Frame>,
}

impl Peer {
    /// New peer plus the receiving end of its outbound queue.
    pub fn new(user_id: String, role: Role) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE);
        (Self { id: Uuid::new_v4(), user_id, role, tx }, rx)
    }
}

pub enum RoomEvent {
    Register(Peer),
    Unregister(Uuid),
    Broadcast(Frame),
    /// Like `Broadcast`, limited to peers that connected with `Role`.
    BroadcastTo(Role, Frame),
    /// Number of live peers, answered after every earlier event was handled.
    Census(oneshot::Sender<usize>),
}

pub struct RoomHub {
    room_id: String,
    peers:   HashMap<Uuid, Peer>,
    rx:      mpsc::Receiver<RoomEvent>,
}

impl RoomHub {
    /// Starts the loop and hands back its mailbox. The loop ends once every
    /// mailbox sender is gone, releasing all outbound queues with it.
    pub fn spawn(room_id: String) -> mpsc::Sender<RoomEvent> {
        let (tx, rx) = mpsc::channel(MAILBOX);
        let hub = Self { room_id, peers: HashMap::new(), rx };
        tokio::spawn(hub.run());
        tx
    }

    async fn run(mut self) {
        debug!(room = %self.room_id, "room hub started");
        while let Some(ev) = self.rx.recv().await {
            self.handle(ev);
        }
        info!(room = %self.room_id, peers = self.peers.len(), "room hub closed");
    }

    fn handle(&mut self, ev: RoomEvent) {
        match ev {
            RoomEvent::Register(peer) => {
                info!(room = %self.room_id, user = %peer.user_id, role = ?peer.role, "client connected");
                self.peers.insert(peer.id, peer);
            }
            RoomEvent::Unregister(id) => {
                // Dropping the peer drops its sender, which closes the queue.
                if let Some(peer) = self.peers.remove(&id) {
                    info!(room = %self.room_id, user = %peer.user_id, role = ?peer.role, "client disconnected");
                }
            }
            RoomEvent::Broadcast(frame) => self.fan_out(None, frame),
            RoomEvent::BroadcastTo(role, frame) => self.fan_out(Some(role), frame),
            RoomEvent::Census(reply) => {
                let _ = reply.send(self.peers.len());
            }
        }
    }

    /// Non-blocking delivery; a peer whose queue is full or closed is dropped.
    fn fan_out(&mut self, only: Option<Role>, frame: Frame) {
        let room_id = &self.room_id;
        self.peers.retain(|_, peer| {
            if only.is_some_and(|r| r != peer.role) {
                return true;
            }
            match peer.tx.try_send(frame.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(room = %room_id, user = %peer.user_id, "outbound queue full, evicting client");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(room = %room_id, user = %peer.user_id, "outbound pump gone, dropping client");
                    false
                }
            }
        });
    }
}
