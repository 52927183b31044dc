//! Source-control seam used by the crew manager.
//!
//! `GitCli` shells out to git through a `CommandRunner`; `MockGit` is an
//! in-memory double whose clone creates the destination directory so
//! directory-backed existence checks behave as they would for real.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::runner::{CommandRunner, RunnerError};
use super::tmux::shell_escape;

#[derive(Debug, Error)]
pub enum GitError {
    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("{0}")]
    Other(String),
}

/// Working-tree status, split the way `git status --porcelain` reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitStatus {
    pub modified: Vec<String>,
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    pub untracked: Vec<String>,
}

impl GitStatus {
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty()
            && self.added.is_empty()
            && self.deleted.is_empty()
            && self.untracked.is_empty()
    }

    /// Parse `git status --porcelain` (v1) output.
    pub fn parse_porcelain(output: &str) -> Self {
        let mut status = GitStatus::default();
        for line in output.lines() {
            if line.len() < 4 {
                continue;
            }
            let code = &line[..2];
            let path = line[3..].trim();
            // Renames are reported as "old -> new".
            let path = path.rsplit(" -> ").next().unwrap_or(path).to_string();
            if code == "??" {
                status.untracked.push(path);
            } else if code.contains('A') {
                status.added.push(path);
            } else if code.contains('D') {
                status.deleted.push(path);
            } else {
                status.modified.push(path);
            }
        }
        status
    }

    /// Modified, added and deleted paths together.
    pub fn changed(&self) -> Vec<String> {
        self.modified
            .iter()
            .chain(&self.added)
            .chain(&self.deleted)
            .cloned()
            .collect()
    }
}

pub trait SourceControl {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError>;

    /// Create `branch` at HEAD and check it out.
    fn create_branch(&self, dir: &Path, branch: &str) -> Result<(), GitError>;

    fn status(&self, dir: &Path) -> Result<GitStatus, GitError>;

    fn current_branch(&self, dir: &Path) -> Result<String, GitError>;
}

impl<T: SourceControl + ?Sized> SourceControl for &T {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        (**self).clone_repo(url, dest)
    }

    fn create_branch(&self, dir: &Path, branch: &str) -> Result<(), GitError> {
        (**self).create_branch(dir, branch)
    }

    fn status(&self, dir: &Path) -> Result<GitStatus, GitError> {
        (**self).status(dir)
    }

    fn current_branch(&self, dir: &Path) -> Result<String, GitError> {
        (**self).current_branch(dir)
    }
}


// ---------------------------------------------------------------------------
// GitCli
// ---------------------------------------------------------------------------

pub struct GitCli<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> GitCli<R> {
    pub fn new(runner: R) -> Self {
        GitCli { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn in_dir(dir: &Path, args: &str) -> String {
        format!("git -C {} {}", shell_escape(&dir.to_string_lossy()), args)
    }
}

impl<R: CommandRunner> SourceControl for GitCli<R> {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        let cmd = format!(
            "git clone --quiet {} {}",
            shell_escape(url),
            shell_escape(&dest.to_string_lossy())
        );
        self.runner.run(&cmd)?;
        Ok(())
    }

    fn create_branch(&self, dir: &Path, branch: &str) -> Result<(), GitError> {
        let cmd = Self::in_dir(dir, &format!("checkout --quiet -b {}", shell_escape(branch)));
        self.runner.run(&cmd)?;
        Ok(())
    }

    fn status(&self, dir: &Path) -> Result<GitStatus, GitError> {
        let out = self.runner.run(&Self::in_dir(dir, "status --porcelain"))?;
        Ok(GitStatus::parse_porcelain(&out))
    }

    fn current_branch(&self, dir: &Path) -> Result<String, GitError> {
        let out = self
            .runner
            .run(&Self::in_dir(dir, "rev-parse --abbrev-ref HEAD"))?;
        let branch = out.trim();
        if branch.is_empty() {
            return Err(GitError::Other(format!(
                "no branch reported for {}",
                dir.display()
            )));
        }
        Ok(branch.to_string())
    }
}


// ---------------------------------------------------------------------------
// MockGit
// ---------------------------------------------------------------------------

/// In-memory git. Unknown directories report a clean tree on `main`.
pub struct MockGit {
    statuses: RefCell<HashMap<PathBuf, GitStatus>>,
    branches: RefCell<HashMap<PathBuf, String>>,
    clones: RefCell<Vec<(String, PathBuf)>>,
    fail_clone: RefCell<Option<String>>,
    fail_status: RefCell<Option<String>>,
    fail_branch: RefCell<Option<String>>,
}

impl MockGit {
    pub fn new() -> Self {
        MockGit {
            statuses: RefCell::new(HashMap::new()),
            branches: RefCell::new(HashMap::new()),
            clones: RefCell::new(Vec::new()),
            fail_clone: RefCell::new(None),
            fail_status: RefCell::new(None),
            fail_branch: RefCell::new(None),
        }
    }

    pub fn set_status(&self, dir: &Path, status: GitStatus) {
        self.statuses.borrow_mut().insert(dir.to_path_buf(), status);
    }

    /// Mark `dir` as having one modified file.
    pub fn make_dirty(&self, dir: &Path, file: &str) {
        self.set_status(
            dir,
            GitStatus {
                modified: vec![file.to_string()],
                ..GitStatus::default()
            },
        );
    }

    /// Next clones fail after creating a partial destination directory.
    pub fn fail_clone(&self, message: &str) {
        *self.fail_clone.borrow_mut() = Some(message.to_string());
    }

    pub fn fail_status(&self, message: &str) {
        *self.fail_status.borrow_mut() = Some(message.to_string());
    }

    pub fn fail_branch(&self, message: &str) {
        *self.fail_branch.borrow_mut() = Some(message.to_string());
    }

    pub fn clones(&self) -> Vec<(String, PathBuf)> {
        self.clones.borrow().clone()
    }
}

impl Default for MockGit {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceControl for MockGit {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        fs::create_dir_all(dest).map_err(|e| GitError::Other(e.to_string()))?;
        if let Some(message) = self.fail_clone.borrow().clone() {
            return Err(GitError::Other(message));
        }
        self.clones
            .borrow_mut()
            .push((url.to_string(), dest.to_path_buf()));
        Ok(())
    }

    fn create_branch(&self, dir: &Path, branch: &str) -> Result<(), GitError> {
        self.branches
            .borrow_mut()
            .insert(dir.to_path_buf(), branch.to_string());
        Ok(())
    }

    fn status(&self, dir: &Path) -> Result<GitStatus, GitError> {
        if let Some(message) = self.fail_status.borrow().clone() {
            return Err(GitError::Other(message));
        }
        Ok(self.statuses.borrow().get(dir).cloned().unwrap_or_default())
    }

    fn current_branch(&self, dir: &Path) -> Result<String, GitError> {
        if let Some(message) = self.fail_branch.borrow().clone() {
            return Err(GitError::Other(message));
        }
        Ok(self
            .branches
            .borrow()
            .get(dir)
            .cloned()
            .unwrap_or_else(|| "main".to_string()))
    }
}
