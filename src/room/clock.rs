/* ------------ 播放位置：由最後一次轉換推算 ------------ */
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Whole seconds elapsed from `since` to `now`, never negative.
pub fn elapsed_secs(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - since).num_seconds().max(0)
}

/// Where playback is at `now`, given the stored base and the time of the last transition.
pub fn effective_position(
    state: PlaybackState,
    base: i64,
    last_transition: DateTime<Utc>,
    now: DateTime<Utc>,
) -> i64 {
    match state {
        PlaybackState::Playing => base.saturating_add(elapsed_secs(last_transition, now)),
        PlaybackState::Stopped | PlaybackState::Paused => base,
    }
}
