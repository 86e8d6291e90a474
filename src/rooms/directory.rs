use std::{cmp::Reverse, collections::{BTreeSet, HashMap}};

use serde::Serialize;

use crate::presence::Registry;

use super::{general::general_name, membership::Membership};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomKind {
    General,
    Public,
    Direct,
}

#[derive(Debug, Clone)]
pub struct RoomMeta {
    pub name: String,
    pub owner: String,
    pub created_at: i64,
    pub kind: RoomKind,
    /// Canonical pair for direct rooms, empty otherwise.
    pub members: BTreeSet<String>,
    seq: u64,
}

/// One entry of `rooms:update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    pub name: String,
    pub owner: String,
    pub participants: Vec<String>,
    pub created_at: i64,
}

#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<String, RoomMeta>,
    next_seq: u64,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a room. Returns `true` if a new entry was made.
    ///
    /// An existing general/public room is left untouched. An existing
    /// direct room keeps its name and gains `members`.
    pub fn create(
        &mut self,
        room_id: &str,
        name: String,
        owner: String,
        kind: RoomKind,
        members: impl IntoIterator<Item = String>,
        created_at: i64,
    ) -> bool {
        if let Some(existing) = self.rooms.get_mut(room_id) {
            if kind == RoomKind::Direct {
                existing.kind = RoomKind::Direct;
                existing.members.extend(members);
            }
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.rooms.insert(
            room_id.to_owned(),
            RoomMeta {
                name,
                owner,
                created_at,
                kind,
                members: members.into_iter().collect(),
                seq,
            },
        );
        true
    }

    pub fn get(&self, room_id: &str) -> Option<&RoomMeta> {
        self.rooms.get(room_id)
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn delete(&mut self, room_id: &str) -> Option<RoomMeta> {
        self.rooms.remove(room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Drops every room nobody is in any more. Returns the deleted ids.
    pub fn sweep_empty(&mut self, membership: &Membership) -> Vec<String> {
        let mut deleted = Vec::new();
        self.rooms.retain(|room_id, _| {
            let live = membership.is_live(room_id);
            if !live {
                deleted.push(room_id.clone());
            }
            live
        });
        deleted
    }

    /// Point-in-time view of all rooms, newest first.
    ///
    /// Participants are members with a registered name; anonymous members
    /// are skipped. The general room is titled with its live member count.
    pub fn snapshot<'a>(
        &'a self,
        membership: &'a Membership,
        registry: &'a Registry,
    ) -> impl Iterator<Item = RoomSummary> + 'a {
        let mut entries: Vec<_> = self.rooms.iter().collect();
        entries.sort_by_key(|(_, meta)| (Reverse(meta.created_at), meta.seq));

        entries.into_iter().map(move |(room_id, meta)| {
            let members = membership.members(room_id);
            let participants = members
                .iter()
                .filter_map(|conn| registry.resolve_name(*conn))
                .map(str::to_owned)
                .collect();
            let name = match meta.kind {
                RoomKind::General => general_name(members.len()),
                RoomKind::Public | RoomKind::Direct => meta.name.clone(),
            };

            RoomSummary {
                room_id: room_id.clone(),
                name,
                owner: meta.owner.clone(),
                participants,
                created_at: meta.created_at,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::presence::ConnId;

    use super::*;

    #[test]
    fn create_does_not_overwrite_public_rooms() {
        let mut directory = RoomDirectory::new();
        assert!(directory.create("room-a", "First".into(), "Ana".into(), RoomKind::Public, [], 1));
        assert!(!directory.create("room-a", "Second".into(), "Beto".into(), RoomKind::Public, [], 2));

        let meta = directory.get("room-a").unwrap();
        assert_eq!(meta.name, "First");
        assert_eq!(meta.owner, "Ana");
    }

    #[test]
    fn direct_rooms_merge_members() {
        let mut directory = RoomDirectory::new();
        directory.create("dm", "Ana & Beto".into(), "Ana".into(), RoomKind::Direct, ["Ana".to_owned(), "Beto".to_owned()], 1);
        directory.create("dm", "Beto & Ana".into(), "Beto".into(), RoomKind::Direct, ["Beto".to_owned(), "Ana".to_owned()], 2);

        assert_eq!(directory.len(), 1);
        let meta = directory.get("dm").unwrap();
        assert_eq!(meta.name, "Ana & Beto");
        assert_eq!(meta.members.len(), 2);
    }

    #[test]
    fn snapshot_is_newest_first_and_skips_anonymous() {
        let mut registry = Registry::new();
        let mut membership = Membership::new();
        let mut directory = RoomDirectory::new();

        let ana = ConnId::new();
        let lurker = ConnId::new();
        registry.register(ana, "Ana".into());

        directory.create("old", "Old".into(), "Ana".into(), RoomKind::Public, [], 10);
        directory.create("new", "New".into(), "Ana".into(), RoomKind::Public, [], 20);
        membership.join("old", ana);
        membership.join("old", lurker);

        let snapshot: Vec<_> = directory.snapshot(&membership, &registry).collect();
        assert_eq!(
            snapshot,
            vec![
                RoomSummary {
                    room_id: "new".into(),
                    name: "New".into(),
                    owner: "Ana".into(),
                    participants: vec![],
                    created_at: 20,
                },
                RoomSummary {
                    room_id: "old".into(),
                    name: "Old".into(),
                    owner: "Ana".into(),
                    participants: vec!["Ana".into()],
                    created_at: 10,
                },
            ]
        );
    }

    #[test]
    fn general_room_is_titled_with_live_count() {
        let registry = Registry::new();
        let mut membership = Membership::new();
        let mut directory = RoomDirectory::new();
        directory.create("g", "ignored".into(), "system".into(), RoomKind::General, [], 1);
        membership.join("g", ConnId::new());
        membership.join("g", ConnId::new());

        let summary = directory.snapshot(&membership, &registry).next().unwrap();
        assert_eq!(summary.name, "Chat general (+2)");
    }

    #[test]
    fn sweep_removes_rooms_without_members() {
        let mut membership = Membership::new();
        let mut directory = RoomDirectory::new();
        directory.create("kept", "K".into(), "Ana".into(), RoomKind::Public, [], 1);
        directory.create("gone", "G".into(), "Ana".into(), RoomKind::Public, [], 2);
        membership.join("kept", ConnId::new());

        assert_eq!(directory.sweep_empty(&membership), vec!["gone".to_owned()]);
        assert!(directory.contains("kept"));
    }
}
