use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf};

use super::{read_json, write_json};
use crate::{
    error::AppResult,
    state::{PlayerId, Room},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRoomPreference {
    pub player_id: PlayerId,
    pub room:      Room,
}

/// Write-through cache of each player's chosen room.
pub struct PreferenceStore {
    path:  PathBuf,
    rooms: HashMap<PlayerId, Room>,
}

impl PreferenceStore {
    pub async fn load(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let saved: Vec<PlayerRoomPreference> = read_json(&path).await?;
        // a hand-edited file may repeat a player; the later entry wins
        let rooms = saved.into_iter().map(|p| (p.player_id, p.room)).collect();
        Ok(Self { path, rooms })
    }

    pub fn get(&self, player: &str) -> Option<Room> {
        self.rooms.get(player).copied()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// The in-memory map only changes once the file on disk holds the new value.
    pub async fn set(&mut self, player: &str, room: Room) -> AppResult<()> {
        let mut next = self.rooms.clone();
        next.insert(player.to_string(), room);

        let mut rows: Vec<PlayerRoomPreference> = next
            .iter()
            .map(|(id, room)| PlayerRoomPreference { player_id: id.clone(), room: *room })
            .collect();
        rows.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        write_json(&self.path, &rows).await?;

        self.rooms = next;
        tracing::debug!(player, %room, "room preference saved");
        Ok(())
    }
}
