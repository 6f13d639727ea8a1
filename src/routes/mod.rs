use axum::{extract::DefaultBodyLimit, Extension, Router};
use tower_http::limit::RequestBodyLimitLayer;

use crate::state::{SharedAccess, SharedManager};

pub mod events;
pub mod logs;

const BODY_LIMIT: usize = 1024 * 1024;

pub fn router() -> Router {
    Router::new().nest("/api", events::router().merge(logs::router()))
}

pub fn app(manager: SharedManager, access: SharedAccess) -> Router {
    router()
        .layer(Extension(manager))
        .layer(Extension(access))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
}
