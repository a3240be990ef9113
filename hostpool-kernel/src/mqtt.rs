use crate::config::MqttConf;
use crate::models::{HeartbeatIn, Node};
use crate::store::Store;
use rumqttc::{AsyncClient, Event, MqttOptions, QoS};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::task;

pub const HEARTBEAT_TOPIC: &str = "hostpool/nodes/heartbeat@v1";

/// Enregistre un heartbeat dans le store ; last_seen = heure de réception
pub fn record_heartbeat(store: &dyn Store, payload: &[u8], now: OffsetDateTime) -> anyhow::Result<String> {
    let hb: HeartbeatIn = serde_json::from_slice(payload)?;
    if hb.node_id.is_empty() {
        anyhow::bail!("heartbeat without node_id");
    }
    let node = Node {
        id: hb.node_id,
        kind: hb.kind,
        last_seen: now,
        uri: hb.uri,
        block_number: hb.block_number,
    };
    let id = node.id.clone();
    store.set_node(node)?;
    Ok(id)
}

pub fn spawn_heartbeat_listener(store: Arc<dyn Store>, cfg: MqttConf) {
    task::spawn(async move {
        let mut opts = MqttOptions::new("hostpool-kernel", &cfg.host, cfg.port);
        opts.set_keep_alive(std::time::Duration::from_secs(15));
        let (client, mut eventloop) = AsyncClient::new(opts, 10);
        log::info!("[mqtt] listening on {HEARTBEAT_TOPIC} via {}:{}", cfg.host, cfg.port);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(rumqttc::Incoming::Publish(p))) if p.topic == HEARTBEAT_TOPIC => {
                    match record_heartbeat(store.as_ref(), &p.payload, OffsetDateTime::now_utc()) {
                        Ok(id) => log::debug!("[mqtt] heartbeat from {id}"),
                        Err(e) => log::warn!("[mqtt] heartbeat rejected: {e}"),
                    }
                }
                Ok(Event::Incoming(rumqttc::Incoming::ConnAck(_))) => {
                    // session non persistante : souscrire à chaque (re)connexion
                    if let Err(e) = client.try_subscribe(HEARTBEAT_TOPIC, QoS::AtLeastOnce) {
                        log::warn!("[mqtt] subscribe failed: {e:?}");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("[mqtt] erreur: {e:?}");
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                }
            }
        }
    });
}
