use axum::{http::StatusCode, response::IntoResponse};
use std::{fmt::Display, path::PathBuf};

pub type AppResult<T> = Result<T, AppErr>;

#[derive(thiserror::Error, Debug)]
pub enum AppErr {
    #[error("Bad request: {0}")]
    Bad(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cooldown: wait {0}s before the next command")]
    Cooldown(u64),

    /* 寫入狀態檔失敗：呼叫端必須知道 */
    #[error("failed to persist {}: {source}", path.display())]
    Persist { path: PathBuf, source: std::io::Error },

    /* 狀態檔存在但無法解析 */
    #[error("malformed state file {}: {source}", path.display())]
    Corrupt { path: PathBuf, source: serde_json::Error },

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
}

impl IntoResponse for AppErr {
    fn into_response(self) -> axum::response::Response {
        let (code, body) = match self {
            AppErr::Bad(msg)       => (StatusCode::BAD_REQUEST, msg),
            AppErr::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            e @ AppErr::Cooldown(_) => (StatusCode::TOO_MANY_REQUESTS, e.to_string()),
            other                  => {
                tracing::error!(error = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        };
        (code, body).into_response()
    }
}

/* ── 小助手 ── */
pub fn bad<E: Display>(e: E) -> AppErr { AppErr::Bad(e.to_string()) }

pub fn persist(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> AppErr {
    let path = path.into();
    move |source| AppErr::Persist { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_rejections_map_to_client_errors() {
        assert_eq!(bad("x").into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppErr::Forbidden("no".into()).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppErr::Cooldown(2).into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn persistence_failure_is_a_server_error() {
        let err = persist("/nowhere/prefs.json")(std::io::Error::other("disk full"));
        assert!(err.to_string().contains("/nowhere/prefs.json"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
