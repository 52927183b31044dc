//! JSON-lines mailbox: one `inbox.jsonl` per mailbox directory.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{MailError, Mailbox, Message};

pub const INBOX_FILE: &str = "inbox.jsonl";

#[derive(Debug, Clone)]
pub struct JsonlMailbox {
    dir: PathBuf,
}

impl JsonlMailbox {
    /// Mailbox rooted at `dir`. Nothing touches disk until the first append.
    pub fn new(dir: &Path) -> Self {
        JsonlMailbox {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn inbox_path(&self) -> PathBuf {
        self.dir.join(INBOX_FILE)
    }

    fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> MailError + '_ {
        move |source| MailError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn rewrite(&self, messages: &[Message]) -> Result<(), MailError> {
        let path = self.inbox_path();
        let mut buf = String::new();
        for msg in messages {
            let line = serde_json::to_string(msg).map_err(|source| MailError::Parse {
                path: path.clone(),
                line: 0,
                source,
            })?;
            buf.push_str(&line);
            buf.push('\n');
        }
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(Self::io_err(&self.dir))?;
        tmp.write_all(buf.as_bytes()).map_err(Self::io_err(&path))?;
        tmp.persist(&path).map_err(|e| MailError::Io {
            path: path.clone(),
            source: e.error,
        })?;
        Ok(())
    }
}

impl Mailbox for JsonlMailbox {
    fn append(&self, message: &Message) -> Result<(), MailError> {
        fs::create_dir_all(&self.dir).map_err(Self::io_err(&self.dir))?;
        let path = self.inbox_path();
        let line = serde_json::to_string(message).map_err(|source| MailError::Parse {
            path: path.clone(),
            line: 0,
            source,
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Self::io_err(&path))?;
        writeln!(file, "{}", line).map_err(Self::io_err(&path))?;
        file.sync_all().map_err(Self::io_err(&path))?;
        Ok(())
    }

    fn count(&self) -> Result<(usize, usize), MailError> {
        let messages = self.list()?;
        let unread = messages.iter().filter(|m| !m.read).count();
        Ok((messages.len(), unread))
    }

    fn list(&self) -> Result<Vec<Message>, MailError> {
        let path = self.inbox_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path).map_err(Self::io_err(&path))?;
        let mut messages = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let msg = serde_json::from_str(line).map_err(|source| MailError::Parse {
                path: path.clone(),
                line: idx + 1,
                source,
            })?;
            messages.push(msg);
        }
        Ok(messages)
    }

    fn mark_read(&self, id: &str) -> Result<(), MailError> {
        let mut messages = self.list()?;
        let msg = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| MailError::NotFound(id.to_string()))?;
        msg.read = true;
        self.rewrite(&messages)
    }
}
