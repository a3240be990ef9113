/**
 * API HTTP HOSTPOOL - Serveur du status public pour le dashboard
 *
 * RÔLE :
 * Expose le snapshot du StatusCache en lecture seule, sans authentification :
 * le payload ne contient que des données publiques (short_id, kind, last_seen).
 *
 * ROUTES :
 * - GET  /health : liveness, toujours "ok"
 * - GET  /status : snapshot JSON (REST)
 * - POST /       : JSON-RPC 2.0 (méthode <rpc_prefix>status)
 *
 * CODES /status :
 * - 200 : snapshot frais ou servi depuis le cache (même s'il porte un `error`)
 * - 503 : cet appel a déclenché le refresh et le store a échoué (body = snapshot)
 * - 504 : attente du refresh au-delà de request_timeout
 *
 * Header Access-Control-Allow-Origin ajouté sur toutes les réponses si configuré.
 */

use crate::rpc::{self, StatusOutcome};
use crate::status::StatusCache;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<StatusCache>,
    pub rpc_prefix: Arc<str>,
    pub request_timeout: Duration,
    pub allow_origin: Option<HeaderValue>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", axum::routing::post(rpc_endpoint))
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(get_status))
        .layer(middleware::from_fn_with_state(app_state.clone(), allow_origin))
        .with_state(app_state)
}

async fn allow_origin(State(app): State<AppState>, req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    if let Some(origin) = &app.allow_origin {
        resp.headers_mut().insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    }
    resp
}

// GET /status
async fn get_status(State(app): State<AppState>) -> Response {
    match rpc::status_within(&app.cache, app.request_timeout).await {
        StatusOutcome::Ok(snapshot) => Json(&*snapshot).into_response(),
        StatusOutcome::Failed(e) => {
            log::warn!("[http] {e}");
            (StatusCode::SERVICE_UNAVAILABLE, Json(&*e.snapshot)).into_response()
        }
        StatusOutcome::TimedOut => {
            log::warn!("[http] status wait exceeded {:?}", app.request_timeout);
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(serde_json::json!({ "error": "timed out waiting for status refresh" })),
            )
                .into_response()
        }
    }
}

// POST / (JSON-RPC)
async fn rpc_endpoint(State(app): State<AppState>, body: String) -> Json<rpc::RpcResponse> {
    Json(rpc::dispatch(&app.cache, &app.rpc_prefix, app.request_timeout, &body).await)
}
