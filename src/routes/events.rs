use axum::{routing::post, Extension, Json, Router};
use serde::Deserialize;

use crate::{
    error::AppResult,
    manager::Handled,
    state::{SessionEvent, SharedAccess, SharedManager},
};

#[derive(Deserialize)]
struct EventRequest {
    #[serde(flatten)]
    event: SessionEvent,
    #[serde(default)]
    roles: Vec<String>,
}

pub fn router() -> Router {
    Router::new().route("/events", post(post_event))
}

async fn post_event(
    Extension(manager): Extension<SharedManager>,
    Extension(access): Extension<SharedAccess>,
    Json(req): Json<EventRequest>,
) -> AppResult<Json<Handled>> {
    /* 指令才檢查權限與冷卻；聊天行只看是否已加入 */
    if req.event.is_command() {
        let mut access = access.lock().await;
        access.authorize(req.event.player_id(), &req.roles)?;
        access.check_cooldown(req.event.player_id())?;
    }
    let handled = manager.lock().await.handle(req.event).await?;
    Ok(Json(handled))
}
