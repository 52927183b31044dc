//! Durable per-worker mail.
//!
//! Mail is the continuity channel between successive process instantiations
//! of one logical worker: a handoff appended before a restart is read by the
//! next process from its own inbox.

mod mailbox;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use mailbox::{JsonlMailbox, INBOX_FILE};

pub const HANDOFF_SUBJECT: &str = "🤝 HANDOFF: Context Refresh";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {source}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("message not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

impl Message {
    pub fn new(from: &str, to: &str, subject: &str, body: &str) -> Self {
        let timestamp = Utc::now();
        let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
        Message {
            id: format!(
                "msg-{}-{}-{}",
                timestamp.timestamp_millis(),
                std::process::id(),
                seq
            ),
            from: from.to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            timestamp,
            read: false,
        }
    }

    /// A handoff from a worker to its own next instantiation.
    pub fn handoff(address: &str, body: &str) -> Self {
        Self::new(address, address, HANDOFF_SUBJECT, body)
    }
}

/// Append-only message store for one worker.
pub trait Mailbox {
    /// Durably record `message`; a later reader of this mailbox observes it.
    fn append(&self, message: &Message) -> Result<(), MailError>;

    /// `(total, unread)`
    fn count(&self) -> Result<(usize, usize), MailError>;

    /// All messages, oldest first.
    fn list(&self) -> Result<Vec<Message>, MailError>;

    fn mark_read(&self, id: &str) -> Result<(), MailError>;
}
