use super::{select_active, Store, StoreError};
use crate::models::Node;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::Duration;
use time::OffsetDateTime;

/// Backend volatile : tout est perdu à l'arrêt du process
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<String, Node>>,
    active_window: Duration,
}

impl MemoryStore {
    pub fn new(active_window: Duration) -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            active_window,
        }
    }
}

impl Store for MemoryStore {
    fn active_hosts(&self, prefix: &str, limit: usize) -> Result<Vec<Node>, StoreError> {
        let nodes = self.nodes.read();
        Ok(select_active(&nodes, self.active_window, OffsetDateTime::now_utc(), prefix, limit))
    }

    fn set_node(&self, node: Node) -> Result<(), StoreError> {
        self.nodes.write().insert(node.id.clone(), node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, age_secs: i64) -> Node {
        Node {
            id: id.into(),
            kind: "parity".into(),
            last_seen: OffsetDateTime::now_utc() - time::Duration::seconds(age_secs),
            uri: None,
            block_number: None,
        }
    }

    #[test]
    fn test_set_node_replaces_by_id() {
        let store = MemoryStore::new(Duration::from_secs(60));
        store.set_node(node("n1", 0)).unwrap();
        let mut updated = node("n1", 0);
        updated.kind = "geth".into();
        store.set_node(updated).unwrap();

        let active = store.active_hosts("", 0).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, "geth");
    }

    #[test]
    fn test_stale_nodes_not_active() {
        let store = MemoryStore::new(Duration::from_secs(60));
        store.set_node(node("fresh", 5)).unwrap();
        store.set_node(node("stale", 300)).unwrap();

        let ids: Vec<_> = store.active_hosts("", 0).unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["fresh"]);
    }
}
