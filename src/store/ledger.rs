use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{read_json, write_json};
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLedgerEntry {
    pub uploaded:    bool,
    pub log_name:    String,
    pub upload_time: DateTime<Utc>,
}

/// Which finalized log files already reached the remote collector.
pub struct UploadLedger {
    path:    PathBuf,
    entries: Vec<UploadLedgerEntry>,
}

impl UploadLedger {
    pub async fn load(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let entries = read_json(&path).await?;
        Ok(Self { path, entries })
    }

    pub fn entries(&self) -> &[UploadLedgerEntry] {
        &self.entries
    }

    pub fn is_uploaded(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.log_name == name && e.uploaded)
    }

    /// Adds one entry per file name. A failed attempt is overwritten by a later
    /// success; a recorded success is final.
    pub async fn record_upload(&mut self, name: &str, uploaded: bool, at: DateTime<Utc>) -> AppResult<()> {
        let mut next = self.entries.clone();
        match next.iter().position(|e| e.log_name == name) {
            Some(i) if next[i].uploaded || !uploaded => return Ok(()),
            Some(i) => {
                next[i].uploaded    = true;
                next[i].upload_time = at;
            }
            None => next.push(UploadLedgerEntry { uploaded, log_name: name.to_string(), upload_time: at }),
        }
        write_json(&self.path, &next).await?;
        self.entries = next;
        Ok(())
    }

    pub fn not_yet_uploaded<'a, I>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .filter(|name| !self.is_uploaded(name))
            .map(String::from)
            .collect()
    }
}
