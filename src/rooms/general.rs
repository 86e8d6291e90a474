use crate::presence::{ConnId, Registry};

use super::{
    directory::{RoomDirectory, RoomKind},
    membership::Membership,
};

pub const GENERAL_ROOM_ID: &str = "room-general";
pub const SYSTEM_OWNER: &str = "system";

/// Population at which the general room exists.
const GENERAL_QUORUM: usize = 2;

pub fn general_name(count: usize) -> String {
    format!("Chat general (+{count})")
}

#[derive(Debug, PartialEq, Eq)]
pub enum GeneralTransition {
    Unchanged,
    /// Room created; every registered connection was pulled in.
    Created,
    /// Room torn down; these connections were still in it.
    Removed(Vec<ConnId>),
}

/// Brings the general room in line with the current population.
///
/// Safe to call after any mutation; a call in the right state does nothing.
pub fn reconcile(
    directory: &mut RoomDirectory,
    membership: &mut Membership,
    registry: &Registry,
    now: i64,
) -> GeneralTransition {
    let active = membership.is_live(GENERAL_ROOM_ID) || directory.contains(GENERAL_ROOM_ID);

    if !active {
        let population = registry.user_count();
        if population < GENERAL_QUORUM {
            return GeneralTransition::Unchanged;
        }

        directory.create(
            GENERAL_ROOM_ID,
            general_name(population),
            SYSTEM_OWNER.to_owned(),
            RoomKind::General,
            [],
            now,
        );
        for conn in registry.connections() {
            membership.join(GENERAL_ROOM_ID, conn);
        }
        tracing::info!(population, "general room opened");
        return GeneralTransition::Created;
    }

    if membership.size(GENERAL_ROOM_ID) < GENERAL_QUORUM {
        directory.delete(GENERAL_ROOM_ID);
        let evicted = membership.clear(GENERAL_ROOM_ID);
        tracing::info!(remaining = evicted.len(), "general room closed");
        return GeneralTransition::Removed(evicted);
    }

    GeneralTransition::Unchanged
}
