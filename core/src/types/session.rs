use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Options for starting a polecat session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Overrides the polecat's clone directory as the session's cwd.
    pub work_dir: Option<PathBuf>,
    /// Issue to hand the agent as a follow-up prompt once it has launched.
    pub issue: Option<String>,
    /// Overrides the configured launch command.
    pub command: Option<String>,
}

/// View of one worker session, recomputed from registry state on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub worker: String,
    pub session_key: String,
    pub running: bool,
    pub rig: String,
}
