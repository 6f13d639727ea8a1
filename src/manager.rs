//! Routes events to the per-room sessions and owns the flush scheduler.

use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
};
use tracing::{info, warn};

use crate::{
    config::Config,
    delivery::DeliveryClient,
    error::{bad, AppResult},
    flush::{FlushPolicy, FlushScheduler},
    session::{ChatLogSession, LogLine},
    state::{Outcome, PlayerId, Room, SessionEvent},
    store::{ledger::UploadLedger, prefs::PreferenceStore},
    uploads::{CatchUpReport, Uploader},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Handled {
    pub outcome: Outcome,
    pub room:    Option<Room>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomStatus {
    pub room:    Room,
    pub members: usize,
    pub open:    Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub rooms:    Vec<RoomStatus>,
    pub buffered: usize,
    pub uploaded: usize,
}

pub struct SessionManager {
    prefs:        PreferenceStore,
    /* 目前在 RP 模式中的玩家 → 所在房間 */
    members:      HashMap<PlayerId, Room>,
    sessions:     BTreeMap<Room, ChatLogSession>,
    flusher:      FlushScheduler,
    uploader:     Uploader,
    upload_files: bool,
}

impl SessionManager {
    /// Loads both state files and wires the pipeline from configuration.
    pub async fn start(cfg: &Config) -> AppResult<Self> {
        let prefs    = PreferenceStore::load(cfg.prefs_path()).await?;
        let ledger   = UploadLedger::load(cfg.ledger_path()).await?;
        let delivery = DeliveryClient::new(cfg.text_webhook.clone(), cfg.file_webhook.clone());
        if !delivery.relays_text() {
            warn!("RP_WEBHOOK_URL not set, chat is only logged locally");
        }
        let flusher  = FlushScheduler::new(delivery.clone(), FlushPolicy::from_config(cfg));
        let uploader = Uploader::new(delivery, ledger, &cfg.log_dir);
        info!(players = prefs.len(), log_dir = %cfg.log_dir.display(), "session manager ready");
        Ok(Self::new(prefs, flusher, uploader, &cfg.log_dir, cfg.upload_files))
    }

    pub fn new(
        prefs: PreferenceStore,
        flusher: FlushScheduler,
        uploader: Uploader,
        log_dir: impl Into<PathBuf>,
        upload_files: bool,
    ) -> Self {
        let log_dir = log_dir.into();
        let sessions = Room::ALL
            .into_iter()
            .map(|room| (room, ChatLogSession::new(room, &log_dir, flusher.clone())))
            .collect();
        Self { prefs, members: HashMap::new(), sessions, flusher, uploader, upload_files }
    }

    #[cfg(test)]
    pub fn flusher(&self) -> &FlushScheduler {
        &self.flusher
    }

    pub fn members_of(&self, room: Room) -> usize {
        self.members.values().filter(|r| **r == room).count()
    }

    pub fn is_open(&self, room: Room) -> bool {
        self.sessions.get(&room).is_some_and(ChatLogSession::is_open)
    }

    pub async fn status(&self) -> Status {
        let rooms = self
            .sessions
            .values()
            .map(|s| RoomStatus {
                room:    s.room(),
                members: self.members_of(s.room()),
                open:    s.current_name().map(String::from),
            })
            .collect();
        let uploaded = self.uploader.ledger().entries().iter().filter(|e| e.uploaded).count();
        Status { rooms, buffered: self.flusher.buffered().await, uploaded }
    }

    pub async fn handle(&mut self, event: SessionEvent) -> AppResult<Handled> {
        match event {
            SessionEvent::Chat { player_id, display_name, message } => {
                self.chat(&player_id, display_name, message).await
            }
            SessionEvent::Join { player_id }                  => self.join(&player_id).await,
            SessionEvent::Leave { player_id }                 => self.leave(&player_id).await,
            SessionEvent::PreferenceChange { player_id, room } => self.switch(&player_id, room).await,
        }
    }

    async fn chat(&mut self, player: &str, name: String, message: String) -> AppResult<Handled> {
        let Some(&member_room) = self.members.get(player) else {
            return Ok(Handled { outcome: Outcome::Ignored, room: None });
        };
        if message.trim().is_empty() {
            return Ok(Handled { outcome: Outcome::Ignored, room: Some(member_room) });
        }
        let room = self.prefs.get(player).unwrap_or(member_room);
        self.session(room)?.append(&LogLine::new(name, message)).await?;
        Ok(Handled { outcome: Outcome::Logged, room: Some(room) })
    }

    async fn join(&mut self, player: &str) -> AppResult<Handled> {
        let room = match self.prefs.get(player) {
            Some(room) => room,
            None => {
                self.prefs.set(player, Room::default()).await?;
                Room::default()
            }
        };
        if self.members.insert(player.to_string(), room).is_none() {
            info!(player, %room, "joined RP chat");
        }
        Ok(Handled { outcome: Outcome::Joined, room: Some(room) })
    }

    async fn leave(&mut self, player: &str) -> AppResult<Handled> {
        let Some(room) = self.members.remove(player) else {
            return Ok(Handled { outcome: Outcome::Ignored, room: None });
        };
        info!(player, %room, "left RP chat");
        if self.members_of(room) == 0 {
            self.close_room(room).await?;
        }
        Ok(Handled { outcome: Outcome::Left, room: Some(room) })
    }

    async fn switch(&mut self, player: &str, room: Room) -> AppResult<Handled> {
        self.prefs.set(player, room).await?;
        // outside RP chat only the preference changes
        let Some(member) = self.members.get_mut(player) else {
            return Ok(Handled { outcome: Outcome::Switched, room: Some(room) });
        };
        let old = std::mem::replace(member, room);
        if old != room {
            info!(player, from = %old, to = %room, "switched RP room");
            if self.members_of(old) == 0 {
                self.close_room(old).await?;
            }
        }
        Ok(Handled { outcome: Outcome::Switched, room: Some(room) })
    }

    /// Closes every open session (the explicit clear command).
    pub async fn clear(&mut self) -> AppResult<usize> {
        let mut closed = 0;
        for room in Room::ALL {
            if self.close_room(room).await? {
                closed += 1;
            }
        }
        Ok(closed)
    }

    pub async fn catch_up(&mut self) -> AppResult<CatchUpReport> {
        if !self.upload_files {
            return Err(bad("file upload mode is off"));
        }
        let open: Vec<PathBuf> = self
            .sessions
            .values()
            .filter_map(|s| s.current_path().map(PathBuf::from))
            .collect();
        self.uploader.catch_up(&open).await
    }

    /// Final flush, then finalize whatever is still open.
    pub async fn shutdown(&mut self) -> AppResult<()> {
        self.flusher.shutdown().await;
        let mut first_err = None;
        for room in Room::ALL {
            if let Err(e) = self.close_room(room).await {
                warn!(%room, error = %e, "failed to finalize chat log on shutdown");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    async fn close_room(&mut self, room: Room) -> AppResult<bool> {
        let Some(closed) = self.session(room)?.close()? else {
            return Ok(false);
        };
        info!(room = %closed.room, file = %closed.name, upload = self.upload_files, "chat log finalized");
        if self.upload_files {
            self.uploader.upload(&closed.name, &closed.path).await?;
        }
        Ok(true)
    }

    fn session(&mut self, room: Room) -> AppResult<&mut ChatLogSession> {
        self.sessions.get_mut(&room).ok_or_else(|| bad(format!("no session for {room}")))
    }
}
