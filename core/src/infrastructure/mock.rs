//! In-memory registry for testing.
//!
//! Records every mutating call and keeps a logical session set, making it easy
//! to write deterministic tests for the lifecycle managers. Failures can be
//! armed per operation to exercise error paths.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{Registry, RegistryError};

/// One recorded registry call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    NewSession { key: String, work_dir: PathBuf },
    KillSession { key: String },
    SendKeys { key: String, text: String },
    SendKeysRaw { key: String, sequence: String },
    SendKeysDebounced { key: String, text: String, delay_ms: u64 },
    SetEnvironment { key: String, name: String, value: String },
    Attach { key: String },
    Capture { key: String, lines: u32 },
}

/// A test-double registry with a logical session set.
pub struct MockRegistry {
    sessions: RefCell<Vec<String>>,
    environment: RefCell<HashMap<String, Vec<(String, String)>>>,
    captures: RefCell<HashMap<String, String>>,
    calls: RefCell<Vec<RegistryCall>>,
    failures: RefCell<HashMap<&'static str, String>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        MockRegistry {
            sessions: RefCell::new(Vec::new()),
            environment: RefCell::new(HashMap::new()),
            captures: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
            failures: RefCell::new(HashMap::new()),
        }
    }

    /// Create a mock with some sessions already present.
    pub fn with_sessions(sessions: &[&str]) -> Self {
        let mock = Self::new();
        mock.sessions
            .borrow_mut()
            .extend(sessions.iter().map(|s| s.to_string()));
        mock
    }

    /// Make every later call of `op` (a `Registry` method name) fail.
    pub fn fail(&self, op: &'static str, message: &str) {
        self.failures.borrow_mut().insert(op, message.to_string());
    }

    pub fn clear_failure(&self, op: &'static str) {
        self.failures.borrow_mut().remove(op);
    }

    /// Pre-load the output returned by `capture_pane` for a session.
    pub fn set_capture(&self, key: &str, content: &str) {
        self.captures
            .borrow_mut()
            .insert(key.to_string(), content.to_string());
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn sessions(&self) -> Vec<String> {
        self.sessions.borrow().clone()
    }

    /// Environment set into a session, in the order it was set.
    pub fn environment(&self, key: &str) -> Vec<(String, String)> {
        self.environment
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    fn check(&self, op: &'static str) -> Result<(), RegistryError> {
        match self.failures.borrow().get(op) {
            Some(message) => Err(RegistryError::Command {
                command: format!("mock {}", op),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn require(&self, key: &str) -> Result<(), RegistryError> {
        if self.sessions.borrow().iter().any(|s| s == key) {
            Ok(())
        } else {
            Err(RegistryError::Command {
                command: format!("mock target {}", key),
                message: format!("can't find session: {}", key),
            })
        }
    }

    fn record(&self, call: RegistryCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry for MockRegistry {
    fn has_session(&self, key: &str) -> Result<bool, RegistryError> {
        self.check("has_session")?;
        Ok(self.sessions.borrow().iter().any(|s| s == key))
    }

    fn new_session(&self, key: &str, work_dir: &Path) -> Result<(), RegistryError> {
        self.check("new_session")?;
        if self.sessions.borrow().iter().any(|s| s == key) {
            return Err(RegistryError::Command {
                command: "mock new_session".into(),
                message: format!("duplicate session: {}", key),
            });
        }
        self.sessions.borrow_mut().push(key.to_string());
        self.record(RegistryCall::NewSession {
            key: key.to_string(),
            work_dir: work_dir.to_path_buf(),
        });
        Ok(())
    }

    fn kill_session(&self, key: &str) -> Result<(), RegistryError> {
        self.check("kill_session")?;
        self.require(key)?;
        self.sessions.borrow_mut().retain(|s| s != key);
        self.environment.borrow_mut().remove(key);
        self.record(RegistryCall::KillSession { key: key.to_string() });
        Ok(())
    }

    fn send_keys(&self, key: &str, text: &str) -> Result<(), RegistryError> {
        self.check("send_keys")?;
        self.require(key)?;
        self.record(RegistryCall::SendKeys {
            key: key.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn send_keys_raw(&self, key: &str, sequence: &str) -> Result<(), RegistryError> {
        self.check("send_keys_raw")?;
        self.require(key)?;
        self.record(RegistryCall::SendKeysRaw {
            key: key.to_string(),
            sequence: sequence.to_string(),
        });
        Ok(())
    }

    fn send_keys_debounced(
        &self,
        key: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), RegistryError> {
        self.check("send_keys_debounced")?;
        self.require(key)?;
        self.record(RegistryCall::SendKeysDebounced {
            key: key.to_string(),
            text: text.to_string(),
            delay_ms: delay.as_millis() as u64,
        });
        Ok(())
    }

    fn set_environment(&self, key: &str, name: &str, value: &str) -> Result<(), RegistryError> {
        self.check("set_environment")?;
        self.require(key)?;
        self.environment
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .push((name.to_string(), value.to_string()));
        self.record(RegistryCall::SetEnvironment {
            key: key.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn attach_session(&self, key: &str) -> Result<(), RegistryError> {
        self.check("attach_session")?;
        self.require(key)?;
        self.record(RegistryCall::Attach { key: key.to_string() });
        Ok(())
    }

    fn capture_pane(&self, key: &str, lines: u32) -> Result<String, RegistryError> {
        self.check("capture_pane")?;
        self.require(key)?;
        self.record(RegistryCall::Capture {
            key: key.to_string(),
            lines,
        });
        Ok(self.captures.borrow().get(key).cloned().unwrap_or_default())
    }

    fn list_sessions(&self) -> Result<Vec<String>, RegistryError> {
        self.check("list_sessions")?;
        Ok(self.sessions.borrow().clone())
    }
}
