use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::info;

use super::Room;

/// id → room. The map lock only covers lookup and insertion; each room keeps
/// its own lock, so a slow registry writer never blocks playback changes.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl RoomRegistry {
    pub async fn create(&self, id: String, name: String, host: String) -> Arc<Room> {
        let room = Arc::new(Room::new(id.clone(), name, host));
        self.rooms.write().await.insert(id.clone(), room.clone());
        info!(room = %id, "room created");
        room
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(id).cloned()
    }

    /// Returns whether a room was removed.
    pub async fn delete(&self, id: &str) -> bool {
        let removed = self.rooms.write().await.remove(id).is_some();
        if removed {
            info!(room = %id, "room deleted");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_delete() {
        let reg = RoomRegistry::default();
        let room = reg.create("r1".into(), "Lounge".into(), "h".into()).await;
        assert_eq!(room.name(), "Lounge");
        assert_eq!(reg.len().await, 1);

        let found = reg.get("r1").await.expect("room present");
        assert!(Arc::ptr_eq(&room, &found));
        assert!(reg.get("missing").await.is_none());

        assert!(reg.delete("r1").await);
        assert!(!reg.delete("r1").await);
        assert!(reg.get("r1").await.is_none());
    }

    #[tokio::test]
    async fn handles_outlive_deletion() {
        let reg = RoomRegistry::default();
        let room = reg.create("r1".into(), "Lounge".into(), "h".into()).await;
        reg.delete("r1").await;
        room.join("l", "Lee");
        assert_eq!(room.snapshot().listeners.len(), 2);
    }

    #[tokio::test]
    async fn rooms_are_independent() {
        let reg = RoomRegistry::default();
        let a = reg.create("a".into(), "A".into(), "ha".into()).await;
        let b = reg.create("b".into(), "B".into(), "hb".into()).await;
        a.seek(40);
        assert_eq!(b.snapshot().position, 0);
        assert!(!b.can_control("ha"));
    }
}
