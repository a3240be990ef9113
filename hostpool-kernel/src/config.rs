use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PoolConfig {
    pub bind: String,
    pub store: StoreKind,
    pub data_dir: String,
    pub allow_origin: Option<String>, // ex: "https://dashboard.example.org"
    pub rpc_prefix: String,
    pub active_window_secs: u64,
    pub status: StatusConf,
    pub mqtt: Option<MqttConf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    #[serde(alias = "file")]
    Persist,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StatusConf {
    pub cache_duration_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
            store: StoreKind::Memory,
            data_dir: "./data".into(),
            allow_origin: None,
            rpc_prefix: "pool_".into(),
            active_window_secs: 60,
            status: StatusConf::default(),
            mqtt: None,
        }
    }
}

impl Default for StatusConf {
    fn default() -> Self {
        Self { cache_duration_secs: 60, request_timeout_secs: 10 }
    }
}

impl PoolConfig {
    pub fn active_window(&self) -> Duration {
        Duration::from_secs(self.active_window_secs)
    }
}

impl StatusConf {
    pub fn cache_duration(&self) -> Duration {
        Duration::from_secs(self.cache_duration_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn parse_config(txt: &str) -> Result<PoolConfig, serde_yaml::Error> {
    if txt.trim().is_empty() { return Ok(PoolConfig::default()); }
    serde_yaml::from_str(txt)
}

pub async fn load_config() -> PoolConfig {
    let path = std::env::var("HOSTPOOL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        parse_config(&txt).unwrap_or_else(|e| {
            log::warn!("[kernel] config invalide ({path}): {e}");
            PoolConfig::default()
        })
    } else {
        log::info!("[kernel] pas de {path}, usage config par défaut");
        PoolConfig::default()
    }
}
