mod directory;
mod dm;
mod general;
mod membership;

pub use directory::{RoomDirectory, RoomKind, RoomMeta, RoomSummary};
pub use dm::{dm_room_id, dm_room_name, random_room_id};
pub use general::{general_name, reconcile as reconcile_general, GeneralTransition, GENERAL_ROOM_ID, SYSTEM_OWNER};
pub use membership::Membership;
