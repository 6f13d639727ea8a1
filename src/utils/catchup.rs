use std::path::{Path, PathBuf};
use tokio::fs;

use crate::{
    error::AppResult,
    session::{is_log_file_name, TRAILER},
};

#[derive(Debug, Default)]
pub struct Scan {
    /// Log file names that end with the trailer, sorted.
    pub finalized:  Vec<String>,
    /// Log files still open or missing the trailer.
    pub unfinished: usize,
}

/// Lists the chat logs in `dir` that are safe to upload.
pub async fn finalized_logs(dir: &Path, open: &[PathBuf]) -> AppResult<Scan> {
    let mut scan = Scan::default();
    let mut entries = match fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(scan),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let Some(name) = entry.file_name().to_str().map(String::from) else { continue };
        if !is_log_file_name(&name) || !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        if open.iter().any(|p| p == &path) {
            scan.unfinished += 1;
            continue;
        }
        // 沒有結尾標記 ⇒ 還在寫或被截斷
        let body = fs::read(&path).await?;
        if body.ends_with(TRAILER.as_bytes()) {
            scan.finalized.push(name);
        } else {
            scan.unfinished += 1;
        }
    }
    scan.finalized.sort();
    Ok(scan)
}
