use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::AppResult,
    manager::Status,
    state::{SharedAccess, SharedManager},
    uploads::CatchUpReport,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminRequest {
    player_id: String,
    #[serde(default)]
    roles: Vec<String>,
}

pub fn router() -> Router {
    Router::new()
        .route("/logs/status",  get(status))
        .route("/logs/clear",   post(clear))
        .route("/logs/catchup", post(catch_up))
}

async fn status(Extension(manager): Extension<SharedManager>) -> Json<Status> {
    Json(manager.lock().await.status().await)
}

async fn clear(
    Extension(manager): Extension<SharedManager>,
    Extension(access): Extension<SharedAccess>,
    Json(req): Json<AdminRequest>,
) -> AppResult<Json<Value>> {
    access.lock().await.authorize_admin(&req.player_id, &req.roles)?;
    let closed = manager.lock().await.clear().await?;
    info!(by = %req.player_id, closed, "RP chat logs cleared");
    Ok(Json(json!({ "closed": closed })))
}

async fn catch_up(
    Extension(manager): Extension<SharedManager>,
    Extension(access): Extension<SharedAccess>,
    Json(req): Json<AdminRequest>,
) -> AppResult<Json<CatchUpReport>> {
    access.lock().await.authorize_admin(&req.player_id, &req.roles)?;
    let report = manager.lock().await.catch_up().await?;
    Ok(Json(report))
}
