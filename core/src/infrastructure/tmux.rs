//! Tmux command builder and the tmux-backed `Registry`.
//!
//! `TmuxCommandBuilder` only builds tmux CLI command strings. `TmuxRegistry`
//! feeds them to a `CommandRunner`, so tests can swap in `MockRunner` and
//! assert on the exact command sequence.

use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::debug;

use super::runner::{CommandRunner, RunnerError};
use super::{Registry, RegistryError};

// ---------------------------------------------------------------------------
// Command builder
// ---------------------------------------------------------------------------

/// Builds tmux CLI command strings without executing them.
pub struct TmuxCommandBuilder;

impl TmuxCommandBuilder {
    pub fn new() -> Self {
        TmuxCommandBuilder
    }

    /// `tmux has-session -t =<name>` (exact match, no prefix matching)
    pub fn has_session(&self, name: &str) -> String {
        format!("tmux has-session -t {}", shell_escape(&exact(name)))
    }

    /// `tmux new-session -d -s <name> -c <cwd>`
    pub fn new_session(&self, name: &str, cwd: &str) -> String {
        format!(
            "tmux new-session -d -s {} -c {}",
            shell_escape(name),
            shell_escape(cwd)
        )
    }

    /// `tmux kill-session -t =<name>`
    pub fn kill_session(&self, name: &str) -> String {
        format!("tmux kill-session -t {}", shell_escape(&exact(name)))
    }

    /// `tmux send-keys -t <target> -l <text>`: typed literally, no key names.
    pub fn send_literal(&self, target: &str, text: &str) -> String {
        format!(
            "tmux send-keys -t {} -l {}",
            shell_escape(target),
            shell_escape(text)
        )
    }

    /// `tmux send-keys -t <target> Enter`
    pub fn send_enter(&self, target: &str) -> String {
        format!("tmux send-keys -t {} Enter", shell_escape(target))
    }

    /// `tmux send-keys -t <target> <keys>`: key names such as `C-c` are interpreted.
    pub fn send_raw(&self, target: &str, keys: &str) -> String {
        format!(
            "tmux send-keys -t {} {}",
            shell_escape(target),
            shell_escape(keys)
        )
    }

    /// `tmux set-environment -t <session> <name> <value>`
    pub fn set_environment(&self, session: &str, name: &str, value: &str) -> String {
        format!(
            "tmux set-environment -t {} {} {}",
            shell_escape(session),
            shell_escape(name),
            shell_escape(value)
        )
    }

    /// `tmux attach-session -t <name>`
    pub fn attach_session(&self, name: &str) -> String {
        format!("tmux attach-session -t {}", shell_escape(name))
    }

    /// `tmux capture-pane -p -t <target> -S -<lines>`
    pub fn capture_pane(&self, target: &str, lines: u32) -> String {
        format!(
            "tmux capture-pane -p -t {} -S -{}",
            shell_escape(target),
            lines
        )
    }

    /// `tmux list-sessions -F '#{session_name}'`
    pub fn list_sessions(&self) -> String {
        "tmux list-sessions -F '#{session_name}'".to_string()
    }
}

impl Default for TmuxCommandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn exact(name: &str) -> String {
    format!("={}", name)
}

// ---------------------------------------------------------------------------
// Output parsers
// ---------------------------------------------------------------------------

/// Parse the output of `list_sessions` into session name strings.
///
/// Each line is a session name.
pub fn parse_list_sessions(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Whether a failed tmux call only means "there is nothing to list".
fn is_no_server(err: &RunnerError) -> bool {
    let stderr = err.stderr();
    stderr.contains("no server running")
        || stderr.contains("no sessions")
        || stderr.contains("error connecting to")
}

// ---------------------------------------------------------------------------
// Shell escaping
// ---------------------------------------------------------------------------

/// Escape a string for safe use in a shell command.
///
/// Wraps the value in single quotes and escapes any embedded single quotes
/// using the `'\''` idiom.
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '/' || c == '%' || c == ':')
    {
        return s.to_string();
    }
    let escaped = s.replace('\'', "'\\''");
    format!("'{}'", escaped)
}

// ---------------------------------------------------------------------------
// TmuxRegistry
// ---------------------------------------------------------------------------

/// The production `Registry`: every operation is one or more tmux commands
/// executed through the runner.
pub struct TmuxRegistry<R: CommandRunner> {
    builder: TmuxCommandBuilder,
    runner: R,
    confirm_delay: Duration,
}

impl<R: CommandRunner> TmuxRegistry<R> {
    /// `confirm_delay` separates typed text from its Enter in `send_keys`.
    pub fn new(runner: R, confirm_delay: Duration) -> Self {
        TmuxRegistry {
            builder: TmuxCommandBuilder::new(),
            runner,
            confirm_delay,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn exec(&self, cmd: String) -> Result<String, RegistryError> {
        debug!(command = %cmd, "tmux");
        Ok(self.runner.run(&cmd)?)
    }

    fn type_and_confirm(&self, key: &str, text: &str, delay: Duration) -> Result<(), RegistryError> {
        self.exec(self.builder.send_literal(key, text))?;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.exec(self.builder.send_enter(key))?;
        Ok(())
    }
}

impl<R: CommandRunner> Registry for TmuxRegistry<R> {
    fn has_session(&self, key: &str) -> Result<bool, RegistryError> {
        match self.runner.run(&self.builder.has_session(key)) {
            Ok(_) => Ok(true),
            Err(RunnerError::Failed { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn new_session(&self, key: &str, work_dir: &Path) -> Result<(), RegistryError> {
        self.exec(self.builder.new_session(key, &work_dir.to_string_lossy()))?;
        Ok(())
    }

    fn kill_session(&self, key: &str) -> Result<(), RegistryError> {
        self.exec(self.builder.kill_session(key))?;
        Ok(())
    }

    fn send_keys(&self, key: &str, text: &str) -> Result<(), RegistryError> {
        self.type_and_confirm(key, text, self.confirm_delay)
    }

    fn send_keys_raw(&self, key: &str, sequence: &str) -> Result<(), RegistryError> {
        self.exec(self.builder.send_raw(key, sequence))?;
        Ok(())
    }

    fn send_keys_debounced(
        &self,
        key: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), RegistryError> {
        self.type_and_confirm(key, text, delay)
    }

    fn set_environment(&self, key: &str, name: &str, value: &str) -> Result<(), RegistryError> {
        self.exec(self.builder.set_environment(key, name, value))?;
        Ok(())
    }

    fn attach_session(&self, key: &str) -> Result<(), RegistryError> {
        let cmd = self.builder.attach_session(key);
        debug!(command = %cmd, "tmux (interactive)");
        Ok(self.runner.run_interactive(&cmd)?)
    }

    fn capture_pane(&self, key: &str, lines: u32) -> Result<String, RegistryError> {
        self.exec(self.builder.capture_pane(key, lines))
    }

    fn list_sessions(&self) -> Result<Vec<String>, RegistryError> {
        match self.runner.run(&self.builder.list_sessions()) {
            Ok(out) => Ok(parse_list_sessions(&out)),
            Err(ref e) if is_no_server(e) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
