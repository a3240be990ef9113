/**
 * STORE - Persistance des noeuds participants du pool
 *
 * RÔLE :
 * Ce module définit l'interface unique que le kernel attend d'un backend de
 * stockage : enregistrer un noeud (heartbeat) et lister les noeuds actifs.
 *
 * FONCTIONNEMENT :
 * - Store trait = interface commune (active_hosts / set_node / close)
 * - MemoryStore = map en mémoire, perdue au redémarrage
 * - FileStore = même map, persistée en JSON dans data_dir
 * - open_store() = sélection du backend depuis la config
 *
 * Un noeud est "actif" s'il a été vu dans la fenêtre active_window_secs.
 */

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::{PoolConfig, StoreKind};
use crate::models::Node;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Erreurs possibles lors des opérations sur le store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store is closed")]
    Closed,
}

/// Interface que tout backend de stockage des noeuds doit implémenter
pub trait Store: Send + Sync {
    /// Noeuds vus récemment dont l'id commence par `prefix`, triés par id.
    /// `limit == 0` = pas de limite.
    fn active_hosts(&self, prefix: &str, limit: usize) -> Result<Vec<Node>, StoreError>;

    /// Insère ou remplace un noeud (clé = id)
    fn set_node(&self, node: Node) -> Result<(), StoreError>;

    /// Libère le backend ; les écritures suivantes peuvent échouer
    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Ouvre le backend demandé par la config
pub fn open_store(cfg: &PoolConfig) -> Result<Arc<dyn Store>, StoreError> {
    let window = cfg.active_window();
    match cfg.store {
        StoreKind::Memory => {
            log::info!("[store] using in-memory backend (active window {}s)", window.as_secs());
            Ok(Arc::new(MemoryStore::new(window)))
        }
        StoreKind::Persist => {
            std::fs::create_dir_all(&cfg.data_dir)?;
            let path = Path::new(&cfg.data_dir).join("nodes.json");
            let store = FileStore::open(&path, window)?;
            log::info!("[store] persistent store using file backend: {}", path.display());
            Ok(Arc::new(store))
        }
    }
}

/// Filtrage commun aux backends : fenêtre active, préfixe, limite.
/// La map est triée par id, l'ordre de sortie l'est donc aussi.
pub(crate) fn select_active(
    nodes: &BTreeMap<String, Node>,
    window: Duration,
    now: OffsetDateTime,
    prefix: &str,
    limit: usize,
) -> Vec<Node> {
    // fenêtre hors de la plage représentable : pas de borne, tout est actif
    let cutoff = time::Duration::try_from(window).ok().and_then(|w| now.checked_sub(w));
    let active = nodes
        .range(prefix.to_string()..)
        .take_while(|(id, _)| id.starts_with(prefix))
        .map(|(_, node)| node)
        .filter(|node| cutoff.map_or(true, |cutoff| node.last_seen >= cutoff))
        .cloned();

    if limit == 0 {
        active.collect()
    } else {
        active.take(limit).collect()
    }
}
