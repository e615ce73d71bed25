use std::sync::Arc;

use crate::{catalog::Catalog, room::RoomRegistry};

/* ------------ 共享句柄 (axum Extension) ------------ */
pub type Rooms   = Arc<RoomRegistry>;
pub type Tracks  = Arc<Catalog>;
pub use crate::hub::BroadcastDirectory as Hub;
