/**
 * HOSTPOOL KERNEL - Point d'entrée du service de status du pool
 *
 * RÔLE : Orchestration des modules : config, store, status cache, MQTT, HTTP.
 * Bootstrap complet avec gestion d'erreurs et logging.
 *
 * ARCHITECTURE : heartbeats MQTT → Store → StatusCache → API HTTP / JSON-RPC.
 * UTILITÉ : Alimente le dashboard public du pool (hosts actifs, version, uptime)
 * sans exposer le store à la charge des requêtes.
 */

mod config;
mod http;
mod models;
mod mqtt;
mod rpc;
mod status;
mod store;

use crate::config::load_config;
use crate::http::AppState;
use crate::status::StatusCache;

use anyhow::Context;
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = load_config().await;
    let version = format!("hostpool/kernel/{}", env!("CARGO_PKG_VERSION"));

    // backend de stockage des noeuds
    let store = store::open_store(&cfg).context("failed to open node store")?;

    // cache du status public
    let cache = Arc::new(StatusCache::new(
        store.clone(),
        OffsetDateTime::now_utc(),
        version.clone(),
        cfg.status.cache_duration(),
    ));

    // MQTT remplit le store (optionnel)
    match cfg.mqtt.clone() {
        Some(mqtt_cfg) => mqtt::spawn_heartbeat_listener(store.clone(), mqtt_cfg),
        None => log::warn!("[kernel] no mqtt section, heartbeat ingestion disabled"),
    }

    let allow_origin = cfg
        .allow_origin
        .as_deref()
        .map(HeaderValue::from_str)
        .transpose()
        .context("invalid allow_origin")?;

    let app_state = AppState {
        cache,
        rpc_prefix: Arc::from(cfg.rpc_prefix.as_str()),
        request_timeout: cfg.status.request_timeout(),
        allow_origin,
    };
    let app = http::build_router(app_state);

    let addr: SocketAddr = cfg.bind.parse().with_context(|| format!("invalid bind address {:?}", cfg.bind))?;
    let listener = TcpListener::bind(addr).await.with_context(|| format!("failed to bind {addr}"))?;
    log::info!("[kernel] starting pool (version {version}), listening on http://{addr}");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            log::info!("[kernel] shutdown requested");
        })
        .await
        .context("http server failed");

    shutdown(served, store.as_ref())
}

/// Ferme le store quelle que soit l'issue du serveur ; l'erreur serveur prime
fn shutdown(served: anyhow::Result<()>, store: &dyn store::Store) -> anyhow::Result<()> {
    let closed = store.close().context("failed to close node store");
    served?;
    closed
}
