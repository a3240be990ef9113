/**
 * FILE STORE - Backend persistant des noeuds (JSON sur disque)
 *
 * FONCTIONNEMENT :
 * - Chargement complet du fichier à l'ouverture (créé vide s'il n'existe pas)
 * - Cache mémoire = source de vérité pour les lectures
 * - Écriture complète à chaque set_node, via fichier temporaire + rename
 *   pour ne jamais laisser un nodes.json à moitié écrit
 * - close() sauvegarde une dernière fois puis refuse les écritures
 */

use super::{select_active, Store, StoreError};
use crate::models::Node;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;

pub struct FileStore {
    storage_path: PathBuf,
    cache: RwLock<BTreeMap<String, Node>>,
    closed: RwLock<bool>,
    active_window: Duration,
}

impl FileStore {
    /// Ouvre (ou crée) le fichier de stockage
    pub fn open<P: AsRef<Path>>(storage_path: P, active_window: Duration) -> Result<Self, StoreError> {
        let storage_path = storage_path.as_ref().to_path_buf();
        let store = Self {
            storage_path,
            cache: RwLock::new(BTreeMap::new()),
            closed: RwLock::new(false),
            active_window,
        };
        store.load_from_disk()?;
        log::debug!("[store] loaded {} nodes from {:?}", store.cache.read().len(), store.storage_path);
        Ok(store)
    }

    fn load_from_disk(&self) -> Result<(), StoreError> {
        if !self.storage_path.exists() {
            fs::write(&self.storage_path, "{}")?;
        }

        let content = fs::read_to_string(&self.storage_path)?;
        let nodes: BTreeMap<String, Node> = if content.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&content)?
        };

        *self.cache.write() = nodes;
        Ok(())
    }

    fn save_to_disk(&self, nodes: &BTreeMap<String, Node>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(nodes)?;
        let tmp = self.storage_path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.storage_path)?;
        Ok(())
    }
}

impl Store for FileStore {
    fn active_hosts(&self, prefix: &str, limit: usize) -> Result<Vec<Node>, StoreError> {
        let nodes = self.cache.read();
        Ok(select_active(&nodes, self.active_window, OffsetDateTime::now_utc(), prefix, limit))
    }

    fn set_node(&self, node: Node) -> Result<(), StoreError> {
        // gardé jusqu'à la fin de l'écriture : close() attend qu'elle se termine
        let closed = self.closed.read();
        if *closed {
            return Err(StoreError::Closed);
        }
        let mut nodes = self.cache.write();
        nodes.insert(node.id.clone(), node);
        self.save_to_disk(&nodes)
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut closed = self.closed.write();
        if *closed {
            return Ok(());
        }
        *closed = true;
        let nodes = self.cache.read();
        self.save_to_disk(&nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> Node {
        Node {
            id: id.into(),
            kind: "geth".into(),
            last_seen: OffsetDateTime::now_utc(),
            uri: Some("enode://abc@127.0.0.1:30303".into()),
            block_number: Some(7_000_000),
        }
    }

    #[test]
    fn test_open_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.json");
        let store = FileStore::open(&path, Duration::from_secs(60)).unwrap();
        assert!(path.exists());
        assert!(store.active_hosts("", 0).unwrap().is_empty());
    }

    #[test]
    fn test_nodes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.json");

        let store = FileStore::open(&path, Duration::from_secs(60)).unwrap();
        store.set_node(node("node-a")).unwrap();
        store.set_node(node("node-b")).unwrap();
        store.close().unwrap();

        let reopened = FileStore::open(&path, Duration::from_secs(60)).unwrap();
        let active = reopened.active_hosts("", 0).unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, "node-a");
        assert_eq!(active[0].block_number, Some(7_000_000));
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("nodes.json"), Duration::from_secs(60)).unwrap();
        store.close().unwrap();
        assert!(matches!(store.set_node(node("late")), Err(StoreError::Closed)));
        // close idempotent
        store.close().unwrap();
    }

    #[test]
    fn test_close_racing_writers_leaves_file_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.json");
        let store = std::sync::Arc::new(FileStore::open(&path, Duration::from_secs(60)).unwrap());

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|j| store.set_node(node(&format!("node-{i}-{j}"))).is_ok())
                        .count()
                })
            })
            .collect();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.close().unwrap();
        let accepted: usize = writers.into_iter().map(|w| w.join().unwrap()).sum();

        // aucune écriture acceptée après close : le fichier contient exactement
        // les noeuds acceptés, et rien n'est réécrit ensuite
        let on_disk = FileStore::open(&path, Duration::from_secs(60)).unwrap();
        assert_eq!(on_disk.active_hosts("", 0).unwrap().len(), accepted);
        assert!(matches!(store.set_node(node("late")), Err(StoreError::Closed)));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            FileStore::open(&path, Duration::from_secs(60)),
            Err(StoreError::Serialization(_))
        ));
    }
}
