/**
 * STATUS CACHE - Snapshot public et mis en cache de l'état du pool
 *
 * RÔLE :
 * Fournit au dashboard (non authentifié) la liste des hosts actifs, la version
 * et l'uptime du kernel, sans jamais laisser une rafale de requêtes frapper
 * directement le store.
 *
 * FONCTIONNEMENT :
 * - Un seul snapshot courant, immuable, remplacé en bloc (Arc swap)
 * - Snapshot frais (time_updated + cache_duration > now) : servi directement,
 *   sans attendre aucun refresh
 * - Snapshot périmé : les appelants se sérialisent sur `refresh`, un seul
 *   interroge le store, les autres récupèrent son résultat
 * - Un refresh en échec est publié aussi (error rempli, hosts vides) : le
 *   store en panne n'est réinterrogé qu'après cache_duration
 *
 * Seul l'appelant qui a réellement fait le fetch reçoit l'erreur du store
 * (RefreshError) ; les autres lisent le champ `error` du snapshot.
 */

use crate::models::{node_host, Host};
use crate::store::{Store, StoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

/// Réponse servie par le endpoint status. Peut dater de cache_duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Date du refresh qui a produit ce snapshot (réussi ou non)
    #[serde(with = "time::serde::rfc3339")]
    pub time_updated: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub time_started: OffsetDateTime,
    pub version: String,
    pub active_hosts: Vec<Host>,
    /// Présent seulement si le refresh a échoué
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Échec du fetch, remonté uniquement à l'appelant qui l'a déclenché.
/// Le snapshot en erreur a déjà été publié dans le cache.
#[derive(Debug, thiserror::Error)]
#[error("status refresh failed: {source}")]
pub struct RefreshError {
    pub snapshot: Arc<StatusSnapshot>,
    #[source]
    pub source: StoreError,
}

/// Source de l'heure courante, remplaçable en test
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

pub struct StatusCache {
    store: Arc<dyn Store>,
    time_started: OffsetDateTime,
    version: String,
    cache_duration: Duration,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<Arc<StatusSnapshot>>>,
    refresh: Mutex<()>,
}

impl StatusCache {
    pub fn new(
        store: Arc<dyn Store>,
        time_started: OffsetDateTime,
        version: impl Into<String>,
        cache_duration: std::time::Duration,
    ) -> Self {
        Self {
            store,
            time_started,
            version: version.into(),
            cache_duration: Duration::try_from(cache_duration).unwrap_or(Duration::MAX),
            clock: Arc::new(SystemClock),
            current: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Retourne le snapshot courant, en le rafraîchissant s'il est périmé.
    ///
    /// Annuler (drop) le future pendant l'attente de `refresh` est sans effet
    /// sur le refresh en cours : le fetch du store est synchrone et n'est
    /// jamais interrompu une fois démarré.
    pub async fn status(&self) -> Result<Arc<StatusSnapshot>, RefreshError> {
        let cached = self.current.read().clone();
        if let Some(snapshot) = &cached {
            if self.is_fresh(snapshot) {
                return Ok(snapshot.clone());
            }
        }

        let _refresh = self.refresh.lock().await;

        // Un autre appelant a publié pendant qu'on attendait le verrou ?
        let current = self.current.read().clone();
        if let Some(newer) = current {
            if cached.as_ref().map_or(true, |old| !Arc::ptr_eq(old, &newer)) {
                return Ok(newer);
            }
        }

        let (snapshot, failure) = self.fetch();
        let snapshot = Arc::new(snapshot);
        *self.current.write() = Some(snapshot.clone());

        match failure {
            None => {
                log::debug!("[status] refreshed: {} active hosts", snapshot.active_hosts.len());
                Ok(snapshot)
            }
            Some(source) => {
                log::warn!("[status] refresh failed, caching error: {source}");
                Err(RefreshError { snapshot, source })
            }
        }
    }

    fn is_fresh(&self, snapshot: &StatusSnapshot) -> bool {
        match snapshot.time_updated.checked_add(self.cache_duration) {
            Some(expires) => self.clock.now() < expires,
            None => true,
        }
    }

    /// Version non cachée : interroge le store et construit un snapshot
    fn fetch(&self) -> (StatusSnapshot, Option<StoreError>) {
        let mut snapshot = StatusSnapshot {
            time_updated: self.clock.now(),
            time_started: self.time_started,
            version: self.version.clone(),
            active_hosts: Vec::new(),
            error: None,
        };

        match self.store.active_hosts("", 0) {
            Ok(nodes) => {
                snapshot.active_hosts = nodes.iter().map(node_host).collect();
                (snapshot, None)
            }
            Err(e) => {
                snapshot.error = Some(e.to_string());
                (snapshot, Some(e))
            }
        }
    }
}
