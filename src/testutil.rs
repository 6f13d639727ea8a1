//! In-process webhook collector used by the delivery tests.

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::Mutex, time};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Text(String),
    File { caption: String, name: String, content_type: String, bytes: Vec<u8> },
}

type Log = Arc<Mutex<Vec<(String, Received)>>>;

pub struct Collector {
    base: String,
    log:  Log,
}

impl Collector {
    pub async fn start() -> Self {
        let log = Log::default();
        let app = Router::new()
            .route("/reject", post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }))
            .route("/slow", post(slow))
            .route("/*path", post(receive))
            .with_state(log.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        Self { base: format!("http://{addr}"), log }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub async fn received(&self) -> Vec<Received> {
        self.log.lock().await.iter().map(|(_, r)| r.clone()).collect()
    }

    pub async fn paths(&self) -> Vec<String> {
        self.log.lock().await.iter().map(|(p, _)| p.clone()).collect()
    }

    pub async fn texts(&self) -> Vec<String> {
        self.received()
            .await
            .into_iter()
            .filter_map(|r| match r {
                Received::Text(t) => Some(t),
                Received::File { .. } => None,
            })
            .collect()
    }

    /// Polls until at least `n` requests arrived or `within` elapsed.
    pub async fn wait_for(&self, n: usize, within: Duration) -> Vec<Received> {
        let deadline = time::Instant::now() + within;
        loop {
            let seen = self.received().await;
            if seen.len() >= n || time::Instant::now() >= deadline {
                return seen;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Records only after a pause, so a test can act while a request is in flight.
async fn slow(state: State<Log>, req: Request) -> Result<Response, StatusCode> {
    time::sleep(Duration::from_millis(250)).await;
    receive(state, req).await
}

async fn receive(State(log): State<Log>, req: Request) -> Result<Response, StatusCode> {
    let path = req.uri().path().to_string();
    let multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/"));

    if !multipart {
        let Json(body): Json<Value> = Json::from_request(req, &()).await.map_err(|_| StatusCode::BAD_REQUEST)?;
        let text = body["content"].as_str().ok_or(StatusCode::BAD_REQUEST)?.to_string();
        log.lock().await.push((path, Received::Text(text)));
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let mut mp = Multipart::from_request(req, &()).await.map_err(|_| StatusCode::BAD_REQUEST)?;
    let mut caption = String::new();
    let mut file = None;
    while let Some(field) = mp.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        match field.name().map(str::to_owned).as_deref() {
            Some("payload_json") => {
                let raw = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                let meta: Value = serde_json::from_str(&raw).map_err(|_| StatusCode::BAD_REQUEST)?;
                caption = meta["content"].as_str().unwrap_or_default().to_string();
            }
            Some("files[0]") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?.to_vec();
                file = Some((name, content_type, bytes));
            }
            _ => {}
        }
    }
    let (name, content_type, bytes) = file.ok_or(StatusCode::BAD_REQUEST)?;
    log.lock().await.push((path, Received::File { caption, name, content_type, bytes }));
    Ok((StatusCode::OK, Json(json!({ "id": "1" }))).into_response())
}
