//! Command runner abstraction for executing shell commands.
//!
//! `CommandRunner` is the trait that backends use to execute system commands.
//! `ShellRunner` is the production implementation that spawns `sh -c`.
//! `MockRunner` is the test double that records calls and returns preset responses.

use std::cell::RefCell;
use std::io;
use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with status {}: {}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()), stderr.trim())]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl RunnerError {
    /// Stderr of a command that ran and failed; empty for spawn failures.
    pub fn stderr(&self) -> &str {
        match self {
            RunnerError::Failed { stderr, .. } => stderr,
            RunnerError::Spawn { .. } => "",
        }
    }
}

/// Trait for executing shell command strings.
pub trait CommandRunner {
    /// Run to completion, capturing stdout.
    fn run(&self, cmd: &str) -> Result<String, RunnerError>;

    /// Run with the caller's terminal attached (stdin/stdout/stderr inherited).
    fn run_interactive(&self, cmd: &str) -> Result<(), RunnerError>;
}

/// Production runner that spawns `sh -c <cmd>`.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, cmd: &str) -> Result<String, RunnerError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RunnerError::Spawn {
                command: cmd.to_string(),
                source,
            })?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(RunnerError::Failed {
                command: cmd.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }

    fn run_interactive(&self, cmd: &str) -> Result<(), RunnerError> {
        let status = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .status()
            .map_err(|source| RunnerError::Spawn {
                command: cmd.to_string(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(RunnerError::Failed {
                command: cmd.to_string(),
                code: status.code(),
                stderr: String::new(),
            })
        }
    }
}

/// Test-double runner that records commands and returns pre-configured responses.
///
/// An `Err(text)` response surfaces as `RunnerError::Failed` with exit code 1
/// and `text` as stderr.
pub struct MockRunner {
    responses: RefCell<Vec<Result<String, String>>>,
    commands: RefCell<Vec<String>>,
}

impl MockRunner {
    pub fn with_responses(responses: Vec<Result<String, String>>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        MockRunner {
            responses: RefCell::new(reversed),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn new() -> Self {
        MockRunner {
            responses: RefCell::new(Vec::new()),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn executed_commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    fn next(&self, cmd: &str) -> Result<String, RunnerError> {
        self.commands.borrow_mut().push(cmd.to_string());
        match self.responses.borrow_mut().pop() {
            Some(Ok(out)) => Ok(out),
            Some(Err(stderr)) => Err(RunnerError::Failed {
                command: cmd.to_string(),
                code: Some(1),
                stderr,
            }),
            None => Ok(String::new()),
        }
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, cmd: &str) -> Result<String, RunnerError> {
        self.next(cmd)
    }

    fn run_interactive(&self, cmd: &str) -> Result<(), RunnerError> {
        self.next(cmd).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_runner_records_commands() {
        let runner = MockRunner::with_responses(vec![Ok("ok".into()), Ok("ok2".into())]);
        let r1 = runner.run("echo hello");
        assert!(r1.is_ok());
        let r2 = runner.run("echo world");
        assert!(r2.is_ok());
        let cmds = runner.executed_commands();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0], "echo hello");
        assert_eq!(cmds[1], "echo world");
    }

    #[test]
    fn mock_runner_returns_responses_in_order() {
        let runner = MockRunner::with_responses(vec![
            Ok("first".into()),
            Err("fail".into()),
            Ok("third".into()),
        ]);
        assert_eq!(runner.run("cmd1").unwrap(), "first");
        assert_eq!(runner.run("cmd2").unwrap_err().stderr(), "fail");
        assert_eq!(runner.run("cmd3").unwrap(), "third");
    }

    #[test]
    fn mock_runner_defaults_to_empty_ok() {
        let runner = MockRunner::new();
        let result = runner.run("anything");
        assert_eq!(result.unwrap(), "");
    }

    #[test]
    fn mock_runner_interactive_is_recorded() {
        let runner = MockRunner::new();
        runner.run_interactive("tmux attach-session -t x").unwrap();
        assert_eq!(runner.executed_commands(), vec!["tmux attach-session -t x"]);
    }

    #[test]
    fn shell_runner_captures_stdout() {
        let out = ShellRunner.run("printf hello").unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn shell_runner_reports_exit_status_and_stderr() {
        let err = ShellRunner.run("echo boom >&2; exit 3").unwrap_err();
        match err {
            RunnerError::Failed { code, ref stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "boom");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
