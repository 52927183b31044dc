//! Witness state document and its on-disk form.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// File name under the rig's `.runtime/` directory.
pub const STATE_FILE: &str = "witness.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Stopped,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessState {
    pub rig_name: String,
    pub state: State,
    /// 0 whenever `state` is `Stopped`.
    #[serde(default)]
    pub pid: i32,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Snapshot of the rig's polecats at the last start; informational only.
    #[serde(default)]
    pub monitored_polecats: Vec<String>,
}

impl WitnessState {
    pub fn stopped(rig_name: &str) -> Self {
        WitnessState {
            rig_name: rig_name.to_string(),
            state: State::Stopped,
            pid: 0,
            started_at: None,
            monitored_polecats: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }

    /// Read the document at `path`. A missing file is the initial state.
    pub fn load(path: &Path, rig_name: &str) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::stopped(rig_name)),
            Err(source) => {
                return Err(Error::State {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&contents).map_err(|e| Error::State {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })
    }

    /// Replace the document at `path` wholesale. Readers see either the
    /// previous document or this one, never a partial write.
    pub fn save(&self, path: &Path) -> Result<()> {
        let state_err = |source| Error::State {
            path: path.to_path_buf(),
            source,
        };
        let parent = path.parent().ok_or_else(|| {
            state_err(io::Error::new(io::ErrorKind::InvalidInput, "state path has no parent"))
        })?;
        fs::create_dir_all(parent).map_err(state_err)?;

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| state_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        // A fresh temp file per write, in the same directory so the rename
        // stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(parent).map_err(state_err)?;
        tmp.write_all(json.as_bytes()).map_err(state_err)?;
        tmp.as_file().sync_all().map_err(state_err)?;
        tmp.persist(path).map_err(|e| state_err(e.error))?;
        Ok(())
    }
}
