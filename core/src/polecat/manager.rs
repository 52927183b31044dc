//! Polecat session lifecycle.
//!
//! A polecat exists when its clone directory exists under `polecats/`; there
//! is no separate record that could go stale. Whether it is running is
//! whatever the registry says right now.

use std::thread;

use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::infrastructure::Registry;
use crate::rig::Rig;
use crate::types::identity::{Role, SessionKey, WorkerIdentity};
use crate::types::session::{SessionInfo, StartOptions};

/// Control sequence sent before a non-forced kill.
pub const INTERRUPT_KEYS: &str = "C-c";

pub struct PolecatManager<'a, R: Registry> {
    registry: R,
    rig: &'a Rig,
    config: &'a OrchestratorConfig,
}

impl<'a, R: Registry> PolecatManager<'a, R> {
    pub fn new(registry: R, rig: &'a Rig, config: &'a OrchestratorConfig) -> Self {
        PolecatManager {
            registry,
            rig,
            config,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    fn session_key(&self, name: &str) -> Result<SessionKey> {
        WorkerIdentity::polecat(&self.rig.name, name)?;
        Ok(SessionKey::polecat(&self.rig.name, name))
    }

    /// Whether the polecat's clone directory exists.
    pub fn exists(&self, name: &str) -> bool {
        self.rig.polecat_dir(name).is_dir()
    }

    fn has_session(&self, key: &SessionKey) -> Result<bool> {
        self.registry
            .has_session(key.as_str())
            .map_err(Error::registry("checking session"))
    }

    fn require_session(&self, key: &SessionKey) -> Result<()> {
        if self.has_session(key)? {
            Ok(())
        } else {
            Err(Error::SessionNotFound(key.to_string()))
        }
    }

    /// Create the polecat's session and launch its agent.
    ///
    /// Side effects happen in this order: session, identity environment,
    /// launch command, then (optionally) the issue prompt. A failure part way
    /// leaves earlier effects in place.
    pub fn start(&self, name: &str, opts: &StartOptions) -> Result<SessionKey> {
        let identity = WorkerIdentity::polecat(&self.rig.name, name)?;
        if !self.exists(name) {
            return Err(Error::WorkerNotFound {
                rig: self.rig.name.clone(),
                name: name.to_string(),
            });
        }

        let key = SessionKey::polecat(&self.rig.name, name);
        if self.has_session(&key)? {
            return Err(Error::SessionRunning(key.to_string()));
        }

        let work_dir = opts
            .work_dir
            .clone()
            .unwrap_or_else(|| self.rig.polecat_dir(name));

        debug!(session = %key, work_dir = %work_dir.display(), "creating polecat session");
        self.registry
            .new_session(key.as_str(), &work_dir)
            .map_err(Error::registry("creating session"))?;

        for (var, value) in identity.env_vars() {
            self.registry
                .set_environment(key.as_str(), var, &value)
                .map_err(Error::registry("setting environment"))?;
        }

        let command = opts
            .command
            .as_deref()
            .unwrap_or(&self.config.polecat_command);
        self.registry
            .send_keys(key.as_str(), command)
            .map_err(Error::registry("sending command"))?;

        info!(rig = %self.rig.name, polecat = name, session = %key, "polecat session started");

        if let Some(issue) = &opts.issue {
            thread::sleep(self.config.timings.issue_settle());
            let prompt = format!("Work on issue: {}", issue);
            // The session is already usable; a lost prompt can be re-injected.
            if let Err(e) = self.inject(name, &prompt) {
                warn!(session = %key, issue = %issue, error = %e, "issue follow-up not delivered");
            }
        }

        Ok(key)
    }

    /// Terminate the polecat's session. Unless `force`, a courtesy interrupt
    /// goes first; the hard kill always follows.
    pub fn stop(&self, name: &str, force: bool) -> Result<()> {
        let key = self.session_key(name)?;
        self.require_session(&key)?;

        if !force {
            if let Err(e) = self.registry.send_keys_raw(key.as_str(), INTERRUPT_KEYS) {
                warn!(session = %key, error = %e, "graceful interrupt failed");
            }
            thread::sleep(self.config.timings.graceful_stop());
        }

        self.registry
            .kill_session(key.as_str())
            .map_err(Error::registry("killing session"))?;
        info!(rig = %self.rig.name, polecat = name, session = %key, force, "polecat session stopped");
        Ok(())
    }

    pub fn is_running(&self, name: &str) -> Result<bool> {
        let key = self.session_key(name)?;
        self.has_session(&key)
    }

    /// Live polecat sessions of this rig. Keys carrying the reserved `crew-`
    /// infix belong to crew workers and are left out.
    pub fn list(&self) -> Result<Vec<SessionInfo>> {
        let sessions = self
            .registry
            .list_sessions()
            .map_err(Error::registry("listing sessions"))?;

        let infos = sessions
            .iter()
            .filter_map(|key| {
                let identity = SessionKey::parse(&self.rig.name, key)?;
                if identity.role() != Role::Polecat {
                    return None;
                }
                Some(SessionInfo {
                    worker: identity.name()?.to_string(),
                    session_key: key.clone(),
                    running: true,
                    rig: self.rig.name.clone(),
                })
            })
            .collect();
        Ok(infos)
    }

    /// Session view of one polecat, running or not.
    pub fn status(&self, name: &str) -> Result<SessionInfo> {
        let key = self.session_key(name)?;
        if !self.exists(name) {
            return Err(Error::WorkerNotFound {
                rig: self.rig.name.clone(),
                name: name.to_string(),
            });
        }
        let running = self.has_session(&key)?;
        Ok(SessionInfo {
            worker: name.to_string(),
            session_key: key.to_string(),
            running,
            rig: self.rig.name.clone(),
        })
    }

    pub fn attach(&self, name: &str) -> Result<()> {
        let key = self.session_key(name)?;
        self.require_session(&key)?;
        self.registry
            .attach_session(key.as_str())
            .map_err(Error::registry("attaching session"))
    }

    /// The last `lines` lines of the polecat's terminal.
    pub fn capture(&self, name: &str, lines: u32) -> Result<String> {
        let key = self.session_key(name)?;
        self.require_session(&key)?;
        self.registry
            .capture_pane(key.as_str(), lines)
            .map_err(Error::registry("capturing pane"))
    }

    /// Type `message` into the polecat's terminal and confirm it, waiting
    /// longer before the Enter the bigger the message is.
    pub fn inject(&self, name: &str, message: &str) -> Result<()> {
        let key = self.session_key(name)?;
        self.require_session(&key)?;
        let delay = self.config.timings.inject.delay(message.len());
        debug!(session = %key, bytes = message.len(), delay_ms = delay.as_millis() as u64, "injecting");
        self.registry
            .send_keys_debounced(key.as_str(), message, delay)
            .map_err(Error::registry("injecting message"))
    }

    /// Stop every live polecat session of the rig, one after another.
    ///
    /// Keeps going past failures and returns only the last one, so the
    /// caller cannot tell from the result which polecats are still running.
    pub fn stop_all(&self, force: bool) -> Result<()> {
        let mut last_err = None;
        for info in self.list()? {
            if let Err(e) = self.stop(&info.worker, force) {
                warn!(polecat = %info.worker, error = %e, "stop failed");
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
