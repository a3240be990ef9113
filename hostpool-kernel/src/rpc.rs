/**
 * RPC - Surface JSON-RPC 2.0 du status pool
 *
 * Une seule méthode publique : `<prefix>status` (ex: "pool_status").
 * Codes d'erreur :
 * - -32700 : JSON invalide
 * - -32600 : requête invalide (pas de "method")
 * - -32601 : méthode inconnue
 * - -32000 : refresh du store en échec (data = snapshot en erreur)
 * - -32001 : attente du refresh trop longue
 */

use crate::status::{RefreshError, StatusCache, StatusSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const REFRESH_FAILED: i64 = -32000;
pub const STATUS_TIMEOUT: i64 = -32001;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0".into(), id, result: Some(result), error: None }
    }

    fn error(id: Value, code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(RpcError { code, message: message.into(), data }),
        }
    }
}

/// Issue d'une demande de status bornée dans le temps
pub enum StatusOutcome {
    Ok(Arc<StatusSnapshot>),
    Failed(RefreshError),
    TimedOut,
}

/// Attend le status au plus `timeout`. Abandonner l'attente ne stoppe pas
/// le refresh en cours, qui sera publié pour les appelants suivants.
pub async fn status_within(cache: &StatusCache, timeout: Duration) -> StatusOutcome {
    match tokio::time::timeout(timeout, cache.status()).await {
        Ok(Ok(snapshot)) => StatusOutcome::Ok(snapshot),
        Ok(Err(e)) => StatusOutcome::Failed(e),
        Err(_) => StatusOutcome::TimedOut,
    }
}

/// Décode et exécute une requête JSON-RPC
pub async fn dispatch(cache: &StatusCache, prefix: &str, timeout: Duration, body: &str) -> RpcResponse {
    let raw: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return RpcResponse::error(Value::Null, PARSE_ERROR, format!("parse error: {e}"), None),
    };
    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let req: RpcRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => return RpcResponse::error(id, INVALID_REQUEST, format!("invalid request: {e}"), None),
    };

    match req.method.strip_prefix(prefix) {
        Some("status") => status_call(cache, timeout, req.id).await,
        _ => {
            log::debug!("[rpc] unknown method {} (params: {})", req.method, req.params);
            RpcResponse::error(req.id, METHOD_NOT_FOUND, format!("method not found: {}", req.method), None)
        }
    }
}

async fn status_call(cache: &StatusCache, timeout: Duration, id: Value) -> RpcResponse {
    match status_within(cache, timeout).await {
        StatusOutcome::Ok(snapshot) => match serde_json::to_value(&*snapshot) {
            Ok(v) => RpcResponse::result(id, v),
            Err(e) => RpcResponse::error(id, REFRESH_FAILED, format!("encode error: {e}"), None),
        },
        StatusOutcome::Failed(e) => {
            let data = serde_json::to_value(&*e.snapshot).ok();
            RpcResponse::error(id, REFRESH_FAILED, e.to_string(), data)
        }
        StatusOutcome::TimedOut => RpcResponse::error(id, STATUS_TIMEOUT, "timed out waiting for status refresh", None),
    }
}
