use std::collections::HashMap;

use crate::presence::ConnId;

/// Who currently receives each room's broadcasts.
///
/// This is the live participant set; room metadata lives in the
/// directory. A room with no members has no entry here.
#[derive(Debug, Default)]
pub struct Membership {
    groups: HashMap<String, Vec<ConnId>>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `conn` was already a member.
    pub fn join(&mut self, room_id: &str, conn: ConnId) -> bool {
        let members = self.groups.entry(room_id.to_owned()).or_default();
        if members.contains(&conn) {
            return false;
        }
        members.push(conn);
        true
    }

    pub fn leave(&mut self, room_id: &str, conn: ConnId) -> bool {
        let Some(members) = self.groups.get_mut(room_id) else {
            return false;
        };
        let before = members.len();
        members.retain(|member| *member != conn);
        let left = members.len() != before;
        if members.is_empty() {
            self.groups.remove(room_id);
        }
        left
    }

    /// Drops `conn` from every room, returning the rooms it was in.
    pub fn leave_all(&mut self, conn: ConnId) -> Vec<String> {
        let mut left = Vec::new();
        self.groups.retain(|room_id, members| {
            let before = members.len();
            members.retain(|member| *member != conn);
            if members.len() != before {
                left.push(room_id.clone());
            }
            !members.is_empty()
        });
        left
    }

    /// Empties a room, returning whoever was still in it.
    pub fn clear(&mut self, room_id: &str) -> Vec<ConnId> {
        self.groups.remove(room_id).unwrap_or_default()
    }

    pub fn members(&self, room_id: &str) -> &[ConnId] {
        self.groups.get(room_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn size(&self, room_id: &str) -> usize {
        self.members(room_id).len()
    }

    pub fn is_member(&self, room_id: &str, conn: ConnId) -> bool {
        self.members(room_id).contains(&conn)
    }

    /// A room "exists" at the transport level while anyone is in it.
    pub fn is_live(&self, room_id: &str) -> bool {
        self.groups.contains_key(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_idempotent_and_ordered() {
        let mut membership = Membership::new();
        let a = ConnId::new();
        let b = ConnId::new();

        assert!(membership.join("r", a));
        assert!(membership.join("r", b));
        assert!(!membership.join("r", a));
        assert_eq!(membership.members("r"), &[a, b]);
    }

    #[test]
    fn last_leave_drops_the_group() {
        let mut membership = Membership::new();
        let a = ConnId::new();
        membership.join("r", a);

        assert!(membership.leave("r", a));
        assert!(!membership.is_live("r"));
        assert!(!membership.leave("r", a));
    }

    #[test]
    fn leave_all_reports_rooms() {
        let mut membership = Membership::new();
        let a = ConnId::new();
        let b = ConnId::new();
        membership.join("one", a);
        membership.join("two", a);
        membership.join("two", b);

        let mut left = membership.leave_all(a);
        left.sort();
        assert_eq!(left, vec!["one".to_owned(), "two".to_owned()]);
        assert!(!membership.is_live("one"));
        assert_eq!(membership.members("two"), &[b]);
    }
}
