//! Ships finalized log files to the collector and keeps the ledger in step.

use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::{
    delivery::{DeliveryClient, DeliveryOutcome},
    error::AppResult,
    store::ledger::UploadLedger,
    utils::catchup,
};

pub const LOG_CONTENT_TYPE: &str = "text/markdown";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatchUpReport {
    pub uploaded: usize,
    pub failed:   usize,
    /// Already in the ledger, still open, or missing the trailer.
    pub skipped:  usize,
}

pub struct Uploader {
    delivery: DeliveryClient,
    ledger:   UploadLedger,
    log_dir:  PathBuf,
}

impl Uploader {
    pub fn new(delivery: DeliveryClient, ledger: UploadLedger, log_dir: impl Into<PathBuf>) -> Self {
        Self { delivery, ledger, log_dir: log_dir.into() }
    }

    pub fn ledger(&self) -> &UploadLedger {
        &self.ledger
    }

    /// One attempt, no retry. Delivery failures are only logged; a ledger
    /// write failure is returned.
    pub async fn upload(&mut self, name: &str, path: &Path) -> AppResult<bool> {
        let bytes = fs::read(path).await?;
        let content_type = mime_guess::from_path(path).first_raw().unwrap_or(LOG_CONTENT_TYPE);
        let caption = format!("RP chat log `{name}`");

        let uploaded = match self.delivery.send_file(name, bytes, content_type, &caption).await {
            Ok(DeliveryOutcome::Sent { status, .. }) if status.is_success() => {
                info!(file = name, %status, "log file uploaded");
                true
            }
            Ok(DeliveryOutcome::Sent { status, body }) => {
                warn!(file = name, %status, body = %body, "collector rejected log file");
                false
            }
            Ok(_) => false,
            Err(e) => {
                warn!(file = name, error = %e, "log upload failed");
                false
            }
        };
        self.ledger.record_upload(name, uploaded, Utc::now()).await?;
        Ok(uploaded)
    }

    /// Uploads every finalized log in the log directory the ledger has not
    /// marked as delivered. Files in `open` belong to live sessions.
    pub async fn catch_up(&mut self, open: &[PathBuf]) -> AppResult<CatchUpReport> {
        let scan = catchup::finalized_logs(&self.log_dir, open).await?;
        let todo = self.ledger.not_yet_uploaded(scan.finalized.iter().map(String::as_str));

        let mut report = CatchUpReport {
            skipped: scan.unfinished + scan.finalized.len() - todo.len(),
            ..Default::default()
        };
        for name in todo {
            let path = self.log_dir.join(&name);
            if self.upload(&name, &path).await? {
                report.uploaded += 1;
            } else {
                report.failed += 1;
            }
        }
        info!(?report, "catch-up scan finished");
        Ok(report)
    }
}
