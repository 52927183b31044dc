//! Persistent, human-managed workers.
//!
//! A crew worker is its workspace directory. Sessions come and go (see
//! [`CrewManager::refresh`]) while the workspace, branch and mailbox persist.

mod manager;

use std::path::PathBuf;

use serde::Serialize;

pub use manager::{CrewManager, MAIL_DIR, UNKNOWN_BRANCH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrewWorker {
    pub name: String,
    pub rig: String,
    pub clone_path: PathBuf,
    pub branch: String,
}

/// Point-in-time report on one crew workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrewStatus {
    pub name: String,
    pub rig: String,
    pub path: PathBuf,
    pub branch: String,
    pub has_session: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    pub git_clean: bool,
    pub modified: Vec<String>,
    pub untracked: Vec<String>,
    pub mail_total: usize,
    pub mail_unread: usize,
}
