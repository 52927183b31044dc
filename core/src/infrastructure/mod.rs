//! Infrastructure seams: the session registry, shell runner, git, and
//! process control.
//!
//! Provides the `Registry` trait and implementations for tmux (production)
//! and mock (testing). Managers only ever talk to these traits, never to
//! tmux or git directly.

pub mod git;
pub mod mock;
pub mod process;
pub mod runner;
pub mod tmux;

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use runner::RunnerError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{command}: {message}")]
    Command { command: String, message: String },

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Capability for hosting terminal sessions, keyed by session name.
///
/// All calls block until the underlying multiplexer has answered.
pub trait Registry {
    fn has_session(&self, key: &str) -> Result<bool, RegistryError>;

    fn new_session(&self, key: &str, work_dir: &Path) -> Result<(), RegistryError>;

    fn kill_session(&self, key: &str) -> Result<(), RegistryError>;

    /// Type `text` and confirm it with Enter.
    fn send_keys(&self, key: &str, text: &str) -> Result<(), RegistryError>;

    /// Send a control sequence (e.g. `C-c`) with no confirmation.
    fn send_keys_raw(&self, key: &str, sequence: &str) -> Result<(), RegistryError>;

    /// Type `text`, wait `delay`, then confirm with Enter.
    fn send_keys_debounced(&self, key: &str, text: &str, delay: Duration)
        -> Result<(), RegistryError>;

    fn set_environment(&self, key: &str, name: &str, value: &str) -> Result<(), RegistryError>;

    /// Hand the calling terminal over to the session until it detaches.
    fn attach_session(&self, key: &str) -> Result<(), RegistryError>;

    /// The last `lines` lines of the session's visible output.
    fn capture_pane(&self, key: &str, lines: u32) -> Result<String, RegistryError>;

    fn list_sessions(&self) -> Result<Vec<String>, RegistryError>;
}

impl<T: Registry + ?Sized> Registry for &T {
    fn has_session(&self, key: &str) -> Result<bool, RegistryError> {
        (**self).has_session(key)
    }

    fn new_session(&self, key: &str, work_dir: &Path) -> Result<(), RegistryError> {
        (**self).new_session(key, work_dir)
    }

    fn kill_session(&self, key: &str) -> Result<(), RegistryError> {
        (**self).kill_session(key)
    }

    fn send_keys(&self, key: &str, text: &str) -> Result<(), RegistryError> {
        (**self).send_keys(key, text)
    }

    fn send_keys_raw(&self, key: &str, sequence: &str) -> Result<(), RegistryError> {
        (**self).send_keys_raw(key, sequence)
    }

    fn send_keys_debounced(
        &self,
        key: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), RegistryError> {
        (**self).send_keys_debounced(key, text, delay)
    }

    fn set_environment(&self, key: &str, name: &str, value: &str) -> Result<(), RegistryError> {
        (**self).set_environment(key, name, value)
    }

    fn attach_session(&self, key: &str) -> Result<(), RegistryError> {
        (**self).attach_session(key)
    }

    fn capture_pane(&self, key: &str, lines: u32) -> Result<String, RegistryError> {
        (**self).capture_pane(key, lines)
    }

    fn list_sessions(&self) -> Result<Vec<String>, RegistryError> {
        (**self).list_sessions()
    }
}
