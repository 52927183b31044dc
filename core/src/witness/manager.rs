//! Witness lifecycle: Stopped <-> Running.
//!
//! There is no heartbeat. Liveness of a recorded pid is re-checked on every
//! start, so a record left behind by a crashed witness is simply overwritten.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::state::{State, WitnessState, STATE_FILE};
use crate::error::{Error, Result};
use crate::infrastructure::process::ProcessControl;
use crate::rig::Rig;

pub struct WitnessManager<'a, P: ProcessControl> {
    rig: &'a Rig,
    processes: P,
}

impl<'a, P: ProcessControl> WitnessManager<'a, P> {
    pub fn new(rig: &'a Rig, processes: P) -> Self {
        WitnessManager { rig, processes }
    }

    pub fn state_path(&self) -> PathBuf {
        self.rig.runtime_dir().join(STATE_FILE)
    }

    fn load(&self) -> Result<WitnessState> {
        WitnessState::load(&self.state_path(), &self.rig.name)
    }

    /// Persisted state with the monitored set refreshed from the rig.
    /// Nothing is written.
    pub fn status(&self) -> Result<WitnessState> {
        let mut state = self.load()?;
        state.monitored_polecats = self.rig.polecats.clone();
        Ok(state)
    }

    /// Mark the witness running under the calling process.
    pub fn start(&self) -> Result<WitnessState> {
        let mut state = self.load()?;

        if state.is_running() {
            if state.pid > 0 && self.processes.exists(state.pid) {
                return Err(Error::AlreadyRunning {
                    rig: self.rig.name.clone(),
                    pid: state.pid,
                });
            }
            debug!(rig = %self.rig.name, stale_pid = state.pid, "overriding stale witness record");
        }

        state.rig_name = self.rig.name.clone();
        state.state = State::Running;
        state.pid = self.processes.current_pid();
        state.started_at = Some(Utc::now());
        state.monitored_polecats = self.rig.polecats.clone();
        state.save(&self.state_path())?;

        info!(rig = %self.rig.name, pid = state.pid, "witness started");
        Ok(state)
    }

    /// Mark the witness stopped. A witness recorded under another process
    /// gets an interrupt; whether it arrives does not matter.
    pub fn stop(&self) -> Result<WitnessState> {
        let mut state = self.load()?;
        if !state.is_running() {
            return Err(Error::NotRunning(self.rig.name.clone()));
        }

        if state.pid > 0 && state.pid != self.processes.current_pid() {
            if let Err(e) = self.processes.interrupt(state.pid) {
                warn!(rig = %self.rig.name, pid = state.pid, error = %e, "could not signal witness");
            }
        }

        state.state = State::Stopped;
        state.pid = 0;
        state.save(&self.state_path())?;

        info!(rig = %self.rig.name, "witness stopped");
        Ok(state)
    }
}
