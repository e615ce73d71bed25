/* ------------ room id → fan-out 迴圈 ------------ */
pub mod client;
pub mod room_hub;

use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::room::Role;
pub use room_hub::{Frame, Peer};
use room_hub::{RoomEvent, RoomHub};

/// Loops are created lazily on the first registration for a room. The map
/// lock guards only the id → mailbox table; each loop owns its own peers.
#[derive(Clone, Default)]
pub struct BroadcastDirectory {
    rooms: Arc<RwLock<HashMap<String, mpsc::Sender<RoomEvent>>>>,
}

impl BroadcastDirectory {
    async fn mailbox(&self, room_id: &str) -> Option<mpsc::Sender<RoomEvent>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    pub async fn register(&self, room_id: &str, peer: Peer) {
        let mailbox = {
            let mut m = self.rooms.write().await;
            m.entry(room_id.to_owned())
                .or_insert_with(|| RoomHub::spawn(room_id.to_owned()))
                .clone()
        };
        if mailbox.send(RoomEvent::Register(peer)).await.is_err() {
            warn!(room = %room_id, "room hub gone before registration");
        }
    }

    /// No-op when the room has no loop or the peer is already gone.
    pub async fn unregister(&self, room_id: &str, peer_id: Uuid) {
        if let Some(mailbox) = self.mailbox(room_id).await {
            let _ = mailbox.send(RoomEvent::Unregister(peer_id)).await;
        }
    }

    /// Queues `frame` for every live connection of the room. Rooms nobody ever
    /// connected to are skipped; a full mailbox drops the frame.
    pub async fn broadcast(&self, room_id: &str, frame: impl Into<Frame>) {
        self.dispatch(room_id, RoomEvent::Broadcast(frame.into())).await;
    }

    /// Same as `broadcast`, but only connections that joined as `role` get it.
    pub async fn broadcast_to(&self, room_id: &str, role: Role, frame: impl Into<Frame>) {
        self.dispatch(room_id, RoomEvent::BroadcastTo(role, frame.into())).await;
    }

    async fn dispatch(&self, room_id: &str, ev: RoomEvent) {
        let Some(mailbox) = self.mailbox(room_id).await else {
            debug!(room = %room_id, "broadcast to room without connections");
            return;
        };
        if let Err(mpsc::error::TrySendError::Full(_)) = mailbox.try_send(ev) {
            warn!(room = %room_id, "room hub is full, skipping message");
        }
    }

    /// Tears down the room's loop; its connections see their queues close.
    pub async fn close(&self, room_id: &str) -> bool {
        self.rooms.write().await.remove(room_id).is_some()
    }

    /// Live connections in a room, 0 if it has no loop.
    pub async fn connections(&self, room_id: &str) -> usize {
        let Some(mailbox) = self.mailbox(room_id).await else { return 0 };
        let (tx, rx) = oneshot::channel();
        if mailbox.send(RoomEvent::Census(tx)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
