//! Authorization gate and per-player command cooldown.

use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};

use crate::{
    config::Config,
    error::{AppErr, AppResult},
};

pub struct Access {
    gate:        bool,
    users:       HashSet<String>,
    roles:       HashSet<String>,
    admin_roles: HashSet<String>,
    cooldown:    Duration,
    last_used:   HashMap<String, Instant>,
}

impl Access {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            gate:        cfg.auth_gate,
            users:       cfg.authorized_users.clone(),
            roles:       cfg.authorized_roles.clone(),
            admin_roles: cfg.admin_roles.clone(),
            cooldown:    cfg.command_cooldown,
            last_used:   HashMap::new(),
        }
    }

    fn is_admin(&self, roles: &[String]) -> bool {
        roles.iter().any(|r| self.admin_roles.contains(r))
    }

    pub fn authorize(&self, player: &str, roles: &[String]) -> AppResult<()> {
        if !self.gate
            || self.users.contains(player)
            || roles.iter().any(|r| self.roles.contains(r))
            || self.is_admin(roles)
        {
            return Ok(());
        }
        Err(AppErr::Forbidden(format!("{player} may not use RP chat")))
    }

    pub fn authorize_admin(&self, player: &str, roles: &[String]) -> AppResult<()> {
        if !self.gate || self.is_admin(roles) {
            return Ok(());
        }
        Err(AppErr::Forbidden(format!("{player} is not an RP chat admin")))
    }

    /// Records a command use, rejecting it if the previous one was too recent.
    pub fn check_cooldown(&mut self, player: &str) -> AppResult<()> {
        self.check_cooldown_at(player, Instant::now())
    }

    fn check_cooldown_at(&mut self, player: &str, now: Instant) -> AppResult<()> {
        if let Some(last) = self.last_used.get(player) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.cooldown {
                let left = (self.cooldown - elapsed).as_secs_f64().ceil() as u64;
                return Err(AppErr::Cooldown(left.max(1)));
            }
        }
        self.last_used.insert(player.to_string(), now);
        Ok(())
    }
}
