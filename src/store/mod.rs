//! Small JSON state files, fully rewritten on every change.

use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tokio::fs;

use crate::error::{persist, AppErr, AppResult};

pub mod ledger;
pub mod prefs;

/// Missing file means first run; anything else that fails to read or parse is fatal.
pub(crate) async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> AppResult<T> {
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(AppErr::Io(e)),
    };
    serde_json::from_slice(&raw).map_err(|source| AppErr::Corrupt { path: path.to_path_buf(), source })
}

/// tmp file + rename, so readers never see a half-written array.
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let body = serde_json::to_vec_pretty(value)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).await.map_err(persist(path))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &body).await.map_err(persist(path))?;
    fs::rename(&tmp, path).await.map_err(persist(path))?;
    Ok(())
}
