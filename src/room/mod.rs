pub mod clock;
pub mod registry;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::catalog::Track;
pub use clock::PlaybackState;
pub use registry::RoomRegistry;

const HOST_DISPLAY_NAME: &str = "Host";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Listener,
}

#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub id:   String,
    pub name: String,
    pub role: Role,
}

/// Immutable view of a room; this is the payload pushed to every connection.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub id:            String,
    pub name:          String,
    pub current_track: Option<Track>,
    pub state:         PlaybackState,
    pub position:      i64,
    pub listeners:     Vec<Member>,
    pub host:          String,
    pub created_at:    DateTime<Utc>,
}

struct Playback {
    track:           Option<Track>,
    state:           PlaybackState,
    base:            i64,
    last_transition: DateTime<Utc>,
}

/* ------------ 房間：名單 + 播放狀態，每間房一把鎖 ------------ */
struct Inner {
    members:  HashMap<String, Member>,
    playback: Playback,
}

pub struct Room {
    id:         String,
    name:       String,
    host:       String,
    created_at: DateTime<Utc>,
    inner:      Mutex<Inner>,
}

impl Room {
    pub fn new(id: String, name: String, host: String) -> Self {
        Self::new_at(id, name, host, Utc::now())
    }

    pub fn new_at(id: String, name: String, host: String, now: DateTime<Utc>) -> Self {
        let mut members = HashMap::new();
        members.insert(
            host.clone(),
            Member { id: host.clone(), name: HOST_DISPLAY_NAME.into(), role: Role::Host },
        );
        Self {
            id,
            name,
            host,
            created_at: now,
            inner: Mutex::new(Inner {
                members,
                playback: Playback {
                    track: None,
                    state: PlaybackState::Stopped,
                    base: 0,
                    last_transition: now,
                },
            }),
        }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn name(&self) -> &str { &self.name }

    /// Adds `user_id` as a listener. An existing entry keeps its role and only
    /// has its display name refreshed.
    pub fn join(&self, user_id: &str, display_name: &str) {
        let mut g = self.inner.lock();
        g.members
            .entry(user_id.to_owned())
            .and_modify(|m| m.name = display_name.to_owned())
            .or_insert_with(|| Member {
                id: user_id.to_owned(),
                name: display_name.to_owned(),
                role: Role::Listener,
            });
    }

    /// Drops `user_id` from the roster. Returns whether an entry was removed.
    pub fn leave(&self, user_id: &str) -> bool {
        self.inner.lock().members.remove(user_id).is_some()
    }

    /// Playback authorization: the caller must currently hold the Host role in the roster.
    pub fn can_control(&self, user_id: &str) -> bool {
        self.inner
            .lock()
            .members
            .get(user_id)
            .is_some_and(|m| m.role == Role::Host)
    }

    /// Identity check against the creator, independent of the roster.
    pub fn is_host(&self, user_id: &str) -> bool {
        self.host == user_id
    }

    pub fn play_track(&self, track: Track) { self.play_track_at(track, Utc::now()) }
    pub fn pause(&self)                    { self.pause_at(Utc::now()) }
    pub fn resume(&self)                   { self.resume_at(Utc::now()) }
    pub fn seek(&self, position: i64)      { self.seek_at(position, Utc::now()) }
    pub fn snapshot(&self) -> Snapshot     { self.snapshot_at(Utc::now()) }

    pub fn play_track_at(&self, track: Track, now: DateTime<Utc>) {
        let mut g = self.inner.lock();
        let pb = &mut g.playback;
        pb.track = Some(track);
        pb.state = PlaybackState::Playing;
        pb.base = 0;
        pb.last_transition = now;
    }

    pub fn pause_at(&self, now: DateTime<Utc>) {
        let mut g = self.inner.lock();
        let pb = &mut g.playback;
        if pb.state != PlaybackState::Playing {
            return;
        }
        pb.base = pb.base.saturating_add(clock::elapsed_secs(pb.last_transition, now));
        pb.state = PlaybackState::Paused;
        pb.last_transition = now;
    }

    pub fn resume_at(&self, now: DateTime<Utc>) {
        let mut g = self.inner.lock();
        let pb = &mut g.playback;
        if pb.state != PlaybackState::Paused {
            return;
        }
        pb.state = PlaybackState::Playing;
        pb.last_transition = now;
    }

    /// Any integer is accepted; range checking belongs to the caller.
    pub fn seek_at(&self, position: i64, now: DateTime<Utc>) {
        let mut g = self.inner.lock();
        let pb = &mut g.playback;
        pb.base = position;
        pb.last_transition = now;
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> Snapshot {
        let g = self.inner.lock();
        let pb = &g.playback;
        Snapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            current_track: pb.track.clone(),
            state: pb.state,
            position: clock::effective_position(pb.state, pb.base, pb.last_transition, now),
            listeners: g.members.values().cloned().collect(),
            host: self.host.clone(),
            created_at: self.created_at,
        }
    }

    /// Snapshot serialized for the wire; `None` (logged) if encoding fails.
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(&self.snapshot())
            .map_err(|e| warn!(room = %self.id, "snapshot encode failed: {e}"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn track(id: &str) -> Track {
        Track::stub(id)
    }

    fn room() -> Room {
        Room::new_at("R".into(), "Friday mix".into(), "H".into(), t(0))
    }

    #[test]
    fn new_room_is_stopped_with_host_enrolled() {
        let r = room();
        let s = r.snapshot_at(t(100));
        assert_eq!(s.state, PlaybackState::Stopped);
        assert_eq!(s.position, 0);
        assert!(s.current_track.is_none());
        assert_eq!(s.listeners.len(), 1);
        assert_eq!(s.listeners[0].role, Role::Host);
        assert!(r.can_control("H"));
        assert!(!r.can_control("L1"));
    }

    #[test]
    fn listener_session_scenario() {
        let r = room();
        r.join("L1", "Alice");
        r.play_track_at(track("T1"), t(0));

        let s = r.snapshot_at(t(5));
        assert_eq!((s.state, s.position), (PlaybackState::Playing, 5));

        r.pause_at(t(5));
        let s = r.snapshot_at(t(5));
        assert_eq!((s.state, s.position), (PlaybackState::Paused, 5));

        r.resume_at(t(10));
        let s = r.snapshot_at(t(10));
        assert_eq!((s.state, s.position), (PlaybackState::Playing, 5));

        assert_eq!(r.snapshot_at(t(13)).position, 8);
        assert!(!r.can_control("L1"));
    }

    #[test]
    fn pause_then_resume_preserves_position() {
        let r = room();
        r.play_track_at(track("T1"), t(0));
        let before = r.snapshot_at(t(37)).position;
        r.pause_at(t(37));
        assert_eq!(r.snapshot_at(t(37)).position, before);
        r.resume_at(t(37));
        assert_eq!(r.snapshot_at(t(37)).position, before);
    }

    #[test]
    fn seek_sets_position_in_any_state() {
        let r = room();
        r.seek_at(12, t(1));
        assert_eq!(r.snapshot_at(t(1)).position, 12);
        assert_eq!(r.snapshot_at(t(1)).state, PlaybackState::Stopped);

        r.play_track_at(track("T1"), t(2));
        r.seek_at(90, t(4));
        assert_eq!(r.snapshot_at(t(4)).position, 90);
        assert_eq!(r.snapshot_at(t(6)).position, 92);

        r.pause_at(t(6));
        r.seek_at(-3, t(8));
        assert_eq!(r.snapshot_at(t(20)).position, -3);
        assert_eq!(r.snapshot_at(t(20)).state, PlaybackState::Paused);
    }

    #[test]
    fn play_track_resets_paused_position() {
        let r = room();
        r.play_track_at(track("T1"), t(0));
        r.pause_at(t(30));
        assert_eq!(r.snapshot_at(t(40)).position, 30);

        r.play_track_at(track("T2"), t(40));
        let s = r.snapshot_at(t(40));
        assert_eq!(s.state, PlaybackState::Playing);
        assert_eq!(s.position, 0);
        assert_eq!(s.current_track.map(|t| t.id), Some("T2".to_string()));
    }

    #[test]
    fn pause_and_resume_are_noops_in_wrong_state() {
        let r = room();
        r.pause_at(t(5));
        assert_eq!(r.snapshot_at(t(5)).state, PlaybackState::Stopped);
        r.resume_at(t(5));
        assert_eq!(r.snapshot_at(t(5)).state, PlaybackState::Stopped);

        r.play_track_at(track("T1"), t(0));
        r.resume_at(t(8));
        // resume while playing must not move the transition timestamp
        assert_eq!(r.snapshot_at(t(10)).position, 10);
        r.pause_at(t(10));
        r.pause_at(t(50));
        assert_eq!(r.snapshot_at(t(60)).position, 10);
    }

    #[test]
    fn rejoin_keeps_role() {
        let r = room();
        r.join("L1", "Alice");
        r.join("L1", "Alice B.");
        r.join("H", "The Host");
        let s = r.snapshot_at(t(0));
        assert_eq!(s.listeners.len(), 2);
        let alice = s.listeners.iter().find(|m| m.id == "L1").unwrap();
        assert_eq!((alice.name.as_str(), alice.role), ("Alice B.", Role::Listener));
        assert!(r.can_control("H"));
    }

    #[test]
    fn host_without_roster_entry_is_host_but_cannot_control() {
        let r = room();
        assert!(r.leave("H"));
        assert!(!r.leave("H"));
        assert!(r.is_host("H"));
        assert!(!r.can_control("H"));
        assert!(!r.is_host("L1"));
    }

    #[test]
    fn extreme_seek_does_not_overflow() {
        let r = room();
        r.play_track_at(track("T1"), t(0));
        r.seek_at(i64::MAX, t(0));
        assert_eq!(r.snapshot_at(t(2)).position, i64::MAX);
        r.pause_at(t(2));
        assert_eq!(r.snapshot_at(t(2)).position, i64::MAX);
        assert!(r.to_json().is_some());

        r.resume_at(t(3));
        r.seek_at(i64::MIN, t(3));
        assert_eq!(r.snapshot_at(t(5)).position, i64::MIN + 2);
        r.pause_at(t(5));
        assert_eq!(r.snapshot_at(t(9)).position, i64::MIN + 2);
    }

    #[test]
    fn to_json_is_the_snapshot() {
        let r = room();
        r.seek_at(7, t(0));
        let v: serde_json::Value = serde_json::from_str(&r.to_json().unwrap()).unwrap();
        assert_eq!(v["id"], "R");
        assert_eq!(v["position"], 7);
    }

    #[test]
    fn snapshot_wire_shape() {
        let r = room();
        r.play_track_at(track("a/b.mp3"), t(0));
        let v = serde_json::to_value(r.snapshot_at(t(3))).unwrap();
        for key in ["id", "name", "current_track", "state", "position", "listeners", "host", "created_at"] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert_eq!(v["state"], "playing");
        assert_eq!(v["position"], 3);
        assert_eq!(v["host"], "H");
        assert_eq!(v["listeners"][0]["role"], "host");
        assert_eq!(v["current_track"]["id"], "a/b.mp3");
    }
}
