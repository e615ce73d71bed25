/* ------------ 單一連線：註冊 + 收發兩個 pump ------------ */
use axum::extract::ws::{Message, WebSocket};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::{BroadcastDirectory, Frame, Peer};
use crate::room::{Role, RoomRegistry};

const PONG: &str = r#"{"type":"pong"}"#;

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMsg {
    Ping,
}

/// Immediate reply owed for an inbound text frame, if any.
fn reply_to(raw: &str) -> Option<Frame> {
    match serde_json::from_str::<ClientMsg>(raw) {
        Ok(ClientMsg::Ping) => Some(Arc::from(PONG)),
        Err(e) => {
            debug!("ignoring inbound frame: {e}");
            None
        }
    }
}

/// Runs the connection until the socket fails or the room evicts it.
///
/// The room loop holds the only strong sender of the outbound queue; the
/// inbound side keeps a weak one for pongs, so unregistering is what closes
/// the queue and ends the outbound pump.
pub async fn serve(
    socket: WebSocket,
    room_id: String,
    user_id: String,
    role: Role,
    hub: BroadcastDirectory,
    rooms: Arc<RoomRegistry>,
) {
    let (peer, queue) = Peer::new(user_id, role);
    let peer_id = peer.id;
    let replies = peer.tx.downgrade();
    if !attach(&hub, &rooms, &room_id, peer).await {
        debug!(room = %room_id, "room deleted during upgrade");
        let _ = socket.close().await;
        return;
    }

    let (sink, stream) = socket.split();
    let mut outbound = tokio::spawn(outbound_pump(sink, queue));

    let evicted = tokio::select! {
        _ = inbound_pump(stream, replies) => false,
        _ = &mut outbound => true,
    };

    hub.unregister(&room_id, peer_id).await;
    if !evicted {
        let _ = outbound.await;
    }
    debug!(room = %room_id, evicted, "connection closed");
}

/// Registers `peer`, then confirms the room still exists. A delete that ran
/// between the upgrade check and `register` has already called `close`, so
/// the loop `register` just spawned is closed again here.
async fn attach(hub: &BroadcastDirectory, rooms: &RoomRegistry, room_id: &str, peer: Peer) -> bool {
    hub.register(room_id, peer).await;
    if rooms.get(room_id).await.is_some() {
        return true;
    }
    hub.close(room_id).await;
    false
}

async fn inbound_pump(mut stream: SplitStream<WebSocket>, replies: mpsc::WeakSender<Frame>) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(raw)) => {
                let Some(reply) = reply_to(&raw) else { continue };
                if let Some(tx) = replies.upgrade() {
                    if tx.try_send(reply).is_err() {
                        debug!("outbound queue unavailable, pong dropped");
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("websocket read error: {e}");
                break;
            }
        }
    }
}

/// Writes queued frames in order; returns once the queue is closed or a write fails.
async fn outbound_pump(mut sink: SplitSink<WebSocket, Message>, mut queue: mpsc::Receiver<Frame>) {
    while let Some(frame) = queue.recv().await {
        if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
            debug!("websocket write error: {e}");
            return;
        }
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_gets_pong() {
        assert_eq!(reply_to(r#"{"type":"ping"}"#).as_deref(), Some(PONG));
        assert_eq!(reply_to(r#"{"type":"ping","data":null}"#).as_deref(), Some(PONG));
    }

    #[test]
    fn other_frames_are_ignored() {
        assert!(reply_to(r#"{"type":"chat","data":"hi"}"#).is_none());
        assert!(reply_to("not json").is_none());
        assert!(reply_to("{}").is_none());
    }

    #[tokio::test]
    async fn attach_to_deleted_room_leaves_no_loop() {
        let hub = BroadcastDirectory::default();
        let rooms = RoomRegistry::default();
        let (peer, mut queue) = Peer::new("late".into(), Role::Listener);

        assert!(!attach(&hub, &rooms, "gone", peer).await);
        assert!(hub.rooms.read().await.is_empty());
        assert_eq!(hub.connections("gone").await, 0);
        assert!(queue.recv().await.is_none());
    }

    #[tokio::test]
    async fn attach_to_live_room_registers() {
        let hub = BroadcastDirectory::default();
        let rooms = RoomRegistry::default();
        rooms.create("r1".into(), "R".into(), "h".into()).await;
        let (peer, _queue) = Peer::new("u".into(), Role::Listener);

        assert!(attach(&hub, &rooms, "r1", peer).await);
        assert_eq!(hub.connections("r1").await, 1);
    }

    #[test]
    fn pong_wire_shape() {
        let v: serde_json::Value = serde_json::from_str(PONG).unwrap();
        assert_eq!(v, serde_json::json!({"type": "pong"}));
    }
}
