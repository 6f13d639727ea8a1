use chrono::{DateTime, Local};
use std::{
    fs::{File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::info;

use crate::{error::AppResult, flush::FlushScheduler, state::Room};

pub const TRAILER:    &str = "-=-=- End of RP Chat Log =-=-";
pub const LOG_MARKER: &str = "-RPChatLog-";

/* ------------ 單行紀錄 ------------ */
#[derive(Debug, Clone)]
pub struct LogLine {
    at:     DateTime<Local>,
    author: String,
    text:   String,
}

impl LogLine {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self::at(Local::now(), author, text)
    }

    pub fn at(at: DateTime<Local>, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self { at, author: author.into(), text: text.into() }
    }

    /// `M/D/YYYY, h:mm:ss AM` then `[name]: message` on the next line.
    pub fn disk_form(&self) -> String {
        format!("{}\n[{}]: {}", self.at.format("%-m/%-d/%Y, %-I:%M:%S %p"), self.author, self.text)
    }

    pub fn buffer_form(&self, room: Room) -> String {
        format!("[{}] {}", room.tag(), self.disk_form())
    }
}

pub fn log_file_name(room: Room, at: DateTime<Local>) -> String {
    format!("{}{LOG_MARKER}{}.md", room.tag(), at.format("%Y-%m-%d_%H-%M-%S"))
}

/// True for names produced by [`log_file_name`], including collision suffixes.
pub fn is_log_file_name(name: &str) -> bool {
    name.ends_with(".md")
        && Room::ALL.iter().any(|r| name.starts_with(&format!("{}{LOG_MARKER}", r.tag())))
}

struct OpenLog {
    name: String,
    path: PathBuf,
    file: File,
}

/// A finalized file, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedLog {
    pub room: Room,
    pub name: String,
    pub path: PathBuf,
}

/* ------------ 每個房間一個 session ------------ */
pub struct ChatLogSession {
    room:    Room,
    dir:     PathBuf,
    flusher: FlushScheduler,
    open:    Option<OpenLog>,
}

impl ChatLogSession {
    pub fn new(room: Room, dir: impl Into<PathBuf>, flusher: FlushScheduler) -> Self {
        Self { room, dir: dir.into(), flusher, open: None }
    }

    pub fn room(&self) -> Room {
        self.room
    }

    pub fn current_name(&self) -> Option<&str> {
        self.open.as_ref().map(|o| o.name.as_str())
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.open.as_ref().map(|o| o.path.as_path())
    }

    /// Writes the line to this room's file (creating it on the first line)
    /// and queues the room-tagged copy for relay.
    pub async fn append(&mut self, line: &LogLine) -> AppResult<()> {
        if self.open.is_none() {
            self.open = Some(self.create()?);
        }
        if let Some(open) = self.open.as_mut() {
            // one write per line, nothing awaited in between
            open.file.write_all(format!("{}\n", line.disk_form()).as_bytes())?;
        }

        self.flusher.push(line.buffer_form(self.room)).await;
        Ok(())
    }

    /// Appends the trailer and releases the file. `None` if nothing was open.
    pub fn close(&mut self) -> AppResult<Option<ClosedLog>> {
        let Some(mut open) = self.open.take() else {
            return Ok(None);
        };
        open.file.write_all(TRAILER.as_bytes())?;
        open.file.sync_all()?;
        info!(room = %self.room, file = %open.name, "chat log closed");
        Ok(Some(ClosedLog { room: self.room, name: open.name, path: open.path }))
    }

    fn create(&self) -> AppResult<OpenLog> {
        std::fs::create_dir_all(&self.dir)?;
        let base = log_file_name(self.room, Local::now());
        let stem = base.trim_end_matches(".md").to_string();

        // same second as a finalized file: never reopen it, pick the next suffix
        let mut n = 1;
        loop {
            let name = if n == 1 { base.clone() } else { format!("{stem}_{n}.md") };
            let path = self.dir.join(&name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    info!(room = %self.room, file = %name, "chat log opened");
                    return Ok(OpenLog { name, path, file });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{delivery::DeliveryClient, flush::FlushPolicy};
    use chrono::TimeZone;

    fn flusher() -> FlushScheduler {
        FlushScheduler::new(
            DeliveryClient::new(None, None),
            FlushPolicy { max_bytes: 1800, max_lines: 100, idle: None, relay_text: true },
        )
    }

    fn fixed(h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 7, h, 5, 9).unwrap()
    }

    #[test]
    fn line_forms() {
        let line = LogLine::at(fixed(14), "Ayla", "hello");
        assert_eq!(line.disk_form(), "3/7/2024, 2:05:09 PM\n[Ayla]: hello");
        assert_eq!(line.buffer_form(Room::Space), "[SPACE] 3/7/2024, 2:05:09 PM\n[Ayla]: hello");
        assert_eq!(LogLine::at(fixed(0), "A", "b").disk_form(), "3/7/2024, 12:05:09 AM\n[A]: b");
    }

    #[test]
    fn file_names() {
        assert_eq!(log_file_name(Room::Fantasy, fixed(14)), "FANTASY-RPChatLog-2024-03-07_14-05-09.md");
        assert!(is_log_file_name("SPACE-RPChatLog-2024-03-07_14-05-09.md"));
        assert!(is_log_file_name("SPACE-RPChatLog-2024-03-07_14-05-09_2.md"));
        assert!(!is_log_file_name("SPACE-RPChatLog-2024-03-07_14-05-09.txt"));
        assert!(!is_log_file_name("rp_uploads.json"));
    }

    #[tokio::test]
    async fn file_holds_lines_then_one_trailer() {
        let dir = tempfile::tempdir().unwrap();
        let flusher = flusher();
        let mut session = ChatLogSession::new(Room::Space, dir.path(), flusher.clone());
        assert!(!session.is_open());

        let lines = [LogLine::new("Ayla", "hello"), LogLine::new("Bren", "hi there")];
        for line in &lines {
            session.append(line).await.unwrap();
        }
        assert!(session.is_open());
        assert_eq!(flusher.buffered().await, 2);

        let path = session.current_path().unwrap().to_path_buf();
        let before = std::fs::read_to_string(&path).unwrap();
        assert!(!before.contains(TRAILER));

        let closed = session.close().unwrap().unwrap();
        assert_eq!(closed.path, path);
        assert_eq!(closed.room, Room::Space);
        assert!(closed.name.starts_with("SPACE-RPChatLog-"));

        let expected: String = lines.iter().map(|l| format!("{}\n", l.disk_form())).collect::<String>() + TRAILER;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
    }

    #[tokio::test]
    async fn second_close_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ChatLogSession::new(Room::Fantasy, dir.path(), flusher());

        assert_eq!(session.close().unwrap(), None);
        session.append(&LogLine::new("Ayla", "hello")).await.unwrap();
        let closed = session.close().unwrap().unwrap();
        assert_eq!(session.close().unwrap(), None);

        let body = std::fs::read_to_string(&closed.path).unwrap();
        assert_eq!(body.matches(TRAILER).count(), 1);
    }

    #[tokio::test]
    async fn append_after_close_opens_a_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ChatLogSession::new(Room::Space, dir.path(), flusher());

        session.append(&LogLine::new("Ayla", "one")).await.unwrap();
        let first = session.close().unwrap().unwrap();
        session.append(&LogLine::new("Ayla", "two")).await.unwrap();
        let second = session.close().unwrap().unwrap();

        assert_ne!(first.path, second.path);
        assert!(is_log_file_name(&second.name));
        assert!(std::fs::read_to_string(&first.path).unwrap().contains("[Ayla]: one"));
        let body = std::fs::read_to_string(&second.path).unwrap();
        assert!(body.contains("[Ayla]: two"));
        assert!(!body.contains("[Ayla]: one"));
    }

    #[tokio::test]
    async fn rooms_write_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let flusher = flusher();
        let mut space = ChatLogSession::new(Room::Space, dir.path(), flusher.clone());
        let mut fantasy = ChatLogSession::new(Room::Fantasy, dir.path(), flusher.clone());

        space.append(&LogLine::new("Ayla", "in space")).await.unwrap();
        fantasy.append(&LogLine::new("Bren", "in fantasy")).await.unwrap();
        assert_ne!(space.current_path(), fantasy.current_path());
        assert_eq!(flusher.buffered().await, 2);

        let closed = space.close().unwrap().unwrap();
        assert!(fantasy.is_open());
        assert!(!std::fs::read_to_string(closed.path).unwrap().contains("in fantasy"));
    }
}
