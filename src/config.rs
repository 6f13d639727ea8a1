//! Runtime configuration, read from the environment (`.env` is loaded by `main`).

use anyhow::{bail, Context};
use std::{collections::HashSet, path::PathBuf, time::Duration};

pub const PREFS_FILE:  &str = "rp_preferences.json";
pub const LEDGER_FILE: &str = "rp_uploads.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub auth_gate:           bool,
    pub authorized_users:    HashSet<String>,
    pub authorized_roles:    HashSet<String>,
    pub admin_roles:         HashSet<String>,
    pub command_cooldown:    Duration,
    pub text_webhook:        Option<String>,
    pub file_webhook:        Option<String>,
    pub upload_files:        bool,
    pub send_text_with_files: bool,
    /// `None` disables the idle timer.
    pub idle_flush:          Option<Duration>,
    pub max_buffer_lines:    usize,
    pub log_dir:             PathBuf,
    pub state_dir:           PathBuf,
    pub bind:                String,
    pub catch_up_on_start:   bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_gate:            false,
            authorized_users:     HashSet::new(),
            authorized_roles:     HashSet::new(),
            admin_roles:          HashSet::new(),
            command_cooldown:     Duration::from_secs(3),
            text_webhook:         None,
            file_webhook:         None,
            upload_files:         false,
            send_text_with_files: false,
            idle_flush:           Some(Duration::from_millis(5_000)),
            max_buffer_lines:     10,
            log_dir:              PathBuf::from("."),
            state_dir:            PathBuf::from("."),
            bind:                 "0.0.0.0:3000".into(),
            catch_up_on_start:    false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Config::default();

        if let Some(v) = get("RP_AUTH_GATE")              { cfg.auth_gate = flag("RP_AUTH_GATE", &v)?; }
        if let Some(v) = get("RP_AUTHORIZED_USERS")       { cfg.authorized_users = list(&v); }
        if let Some(v) = get("RP_AUTHORIZED_ROLES")       { cfg.authorized_roles = list(&v); }
        if let Some(v) = get("RP_ADMIN_ROLES")            { cfg.admin_roles = list(&v); }
        if let Some(v) = get("RP_COMMAND_COOLDOWN_SECS")  {
            cfg.command_cooldown = Duration::from_secs(number("RP_COMMAND_COOLDOWN_SECS", &v)?);
        }
        cfg.text_webhook = get("RP_WEBHOOK_URL");
        cfg.file_webhook = get("RP_FILE_WEBHOOK_URL").or_else(|| cfg.text_webhook.clone());
        if let Some(v) = get("RP_UPLOAD_FILES")           { cfg.upload_files = flag("RP_UPLOAD_FILES", &v)?; }
        if let Some(v) = get("RP_SEND_TEXT_WITH_FILES")   {
            cfg.send_text_with_files = flag("RP_SEND_TEXT_WITH_FILES", &v)?;
        }
        if let Some(v) = get("RP_IDLE_FLUSH_MS") {
            let ms = number("RP_IDLE_FLUSH_MS", &v)?;
            cfg.idle_flush = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(v) = get("RP_MAX_BUFFER_LINES") {
            let n = number("RP_MAX_BUFFER_LINES", &v)?;
            if n == 0 { bail!("RP_MAX_BUFFER_LINES must be at least 1"); }
            cfg.max_buffer_lines = n as usize;
        }
        if let Some(v) = get("RP_LOG_DIR")                { cfg.log_dir = PathBuf::from(v); }
        if let Some(v) = get("RP_STATE_DIR")              { cfg.state_dir = PathBuf::from(v); }
        if let Some(v) = get("RP_BIND")                   { cfg.bind = v; }
        if let Some(v) = get("RP_CATCH_UP_ON_START")      {
            cfg.catch_up_on_start = flag("RP_CATCH_UP_ON_START", &v)?;
        }
        Ok(cfg)
    }

    /// Text batches go out unless the operator asked for files only.
    pub fn relay_text(&self) -> bool {
        !self.upload_files || self.send_text_with_files
    }

    pub fn prefs_path(&self) -> PathBuf  { self.state_dir.join(PREFS_FILE) }
    pub fn ledger_path(&self) -> PathBuf { self.state_dir.join(LEDGER_FILE) }
}

fn flag(key: &str, v: &str) -> anyhow::Result<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on"  => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{key}: expected a boolean, got `{v}`"),
    }
}

fn number(key: &str, v: &str) -> anyhow::Result<u64> {
    v.parse().with_context(|| format!("{key}: expected a number, got `{v}`"))
}

fn list(v: &str) -> HashSet<String> {
    v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}
