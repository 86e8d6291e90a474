use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one live socket. Minted by the transport on upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnId(Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short fragment used for anonymous labels, e.g. `Anon-3f9a`.
    pub fn fragment(&self) -> String {
        self.0.simple().to_string()[..4].to_owned()
    }

    pub fn anon_label(&self) -> String {
        format!("Anon-{}", self.fragment())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Bidirectional connection <-> display name map.
///
/// Names are not unique: a second `register` with a taken name moves the
/// name lookup to the newer connection while the older connection keeps
/// resolving to the same name.
#[derive(Debug, Default)]
pub struct Registry {
    names: HashMap<ConnId, String>,
    conns: HashMap<String, ConnId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, conn: ConnId, name: String) {
        if let Some(previous) = self.names.insert(conn, name.clone()) {
            if previous != name && self.conns.get(&previous) == Some(&conn) {
                self.conns.remove(&previous);
            }
        }
        self.conns.insert(name, conn);
    }

    pub fn resolve_name(&self, conn: ConnId) -> Option<&str> {
        self.names.get(&conn).map(String::as_str)
    }

    pub fn resolve_connection(&self, name: &str) -> Option<ConnId> {
        self.conns.get(name).copied()
    }

    /// Removes both directions. The name entry is only dropped while it
    /// still points at `conn`.
    pub fn unregister(&mut self, conn: ConnId) -> Option<String> {
        let name = self.names.remove(&conn)?;
        if self.conns.get(&name) == Some(&conn) {
            self.conns.remove(&name);
        }
        Some(name)
    }

    /// Number of distinct names currently online.
    pub fn user_count(&self) -> usize {
        self.conns.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.conns.keys().map(String::as_str)
    }

    pub fn connections(&self) -> impl Iterator<Item = ConnId> + '_ {
        self.conns.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_resolves_both_ways() {
        let mut registry = Registry::new();
        let ana = ConnId::new();
        registry.register(ana, "Ana".to_owned());

        assert_eq!(registry.resolve_name(ana), Some("Ana"));
        assert_eq!(registry.resolve_connection("Ana"), Some(ana));
        assert_eq!(registry.user_count(), 1);
    }

    #[test]
    fn name_collision_last_writer_wins() {
        let mut registry = Registry::new();
        let first = ConnId::new();
        let second = ConnId::new();
        registry.register(first, "Ana".to_owned());
        registry.register(second, "Ana".to_owned());

        assert_eq!(registry.resolve_connection("Ana"), Some(second));
        assert_eq!(registry.resolve_name(first), Some("Ana"));
        assert_eq!(registry.user_count(), 1);

        // the stale connection leaving must not evict the newer owner
        registry.unregister(first);
        assert_eq!(registry.resolve_connection("Ana"), Some(second));
    }

    #[test]
    fn rename_drops_old_name() {
        let mut registry = Registry::new();
        let conn = ConnId::new();
        registry.register(conn, "Ana".to_owned());
        registry.register(conn, "Beto".to_owned());

        assert_eq!(registry.resolve_connection("Ana"), None);
        assert_eq!(registry.resolve_connection("Beto"), Some(conn));
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let mut registry = Registry::new();
        assert_eq!(registry.unregister(ConnId::new()), None);
    }

    #[test]
    fn anon_label_uses_id_fragment() {
        let conn = ConnId::new();
        let label = conn.anon_label();
        assert!(label.starts_with("Anon-"));
        assert_eq!(label.len(), "Anon-".len() + 4);
        assert!(conn.to_string().starts_with(&label[5..]));
    }
}
