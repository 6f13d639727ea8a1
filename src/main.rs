mod access;
mod config;
mod delivery;
mod error;
mod flush;
mod manager;
mod routes;
mod session;
mod state;
mod store;
mod uploads;
mod utils {
    pub mod catchup;
}
#[cfg(test)]
mod testutil;

use anyhow::Context;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{access::Access, config::Config, manager::SessionManager};

/* 單執行緒：所有事件依序在同一個 runtime 上處理 */
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let cfg = Config::from_env().context("reading RP_* configuration")?;
    let mut manager = SessionManager::start(&cfg).await.context("loading RP chat state")?;

    if cfg.catch_up_on_start && cfg.upload_files {
        match manager.catch_up().await {
            Ok(report) => info!(?report, "start-up catch-up done"),
            Err(e)     => warn!(error = %e, "start-up catch-up failed"),
        }
    }

    let manager = Arc::new(Mutex::new(manager));
    let access  = Arc::new(Mutex::new(Access::from_config(&cfg)));
    let app     = routes::app(manager.clone(), access);

    let listener = tokio::net::TcpListener::bind(&cfg.bind)
        .await
        .with_context(|| format!("binding {}", cfg.bind))?;
    info!(addr = %cfg.bind, "RP chat log relay listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 關閉前：最後一次 flush，再收尾所有開著的紀錄檔
    manager.lock().await.shutdown().await.context("finalizing chat logs")?;
    info!("RP chat log relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
