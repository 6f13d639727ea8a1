use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tokio::sync::Mutex;

use crate::{access::Access, manager::SessionManager};

pub type PlayerId = String;

/* ------------ RP 房間 ------------ */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Room {
    Fantasy,
    #[default]
    Space,
}

impl Room {
    pub const ALL: [Room; 2] = [Room::Fantasy, Room::Space];

    /// Upper-case tag used in log file names and buffered lines.
    pub fn tag(self) -> &'static str {
        match self {
            Room::Fantasy => "FANTASY",
            Room::Space   => "SPACE",
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/* ------------ 輸入事件 ------------ */
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    Chat { player_id: PlayerId, display_name: String, message: String },
    Join { player_id: PlayerId },
    Leave { player_id: PlayerId },
    PreferenceChange { player_id: PlayerId, room: Room },
}

impl SessionEvent {
    pub fn player_id(&self) -> &str {
        match self {
            SessionEvent::Chat { player_id, .. }
            | SessionEvent::Join { player_id }
            | SessionEvent::Leave { player_id }
            | SessionEvent::PreferenceChange { player_id, .. } => player_id,
        }
    }

    /// Chat lines are captured, everything else is a player command.
    pub fn is_command(&self) -> bool {
        !matches!(self, SessionEvent::Chat { .. })
    }
}

/// What the manager did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Logged,
    Joined,
    Left,
    Switched,
    Ignored,
}

pub type SharedManager = Arc<Mutex<SessionManager>>;
pub type SharedAccess  = Arc<Mutex<Access>>;
