//! Crew workspace and session management.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use super::{CrewStatus, CrewWorker};
use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::infrastructure::git::SourceControl;
use crate::infrastructure::Registry;
use crate::mail::{JsonlMailbox, Mailbox, Message};
use crate::rig::{list_subdirs, Rig, RIG_CONFIG_FILE};
use crate::types::identity::{SessionKey, WorkerIdentity};

/// Directory under a crew workspace that holds its mailbox.
pub const MAIL_DIR: &str = "mail";

/// Reported branch of a workspace git cannot read.
pub const UNKNOWN_BRANCH: &str = "unknown";

pub struct CrewManager<'a, R: Registry, G: SourceControl> {
    registry: R,
    git: G,
    rig: &'a Rig,
    config: &'a OrchestratorConfig,
}

impl<'a, R: Registry, G: SourceControl> CrewManager<'a, R, G> {
    pub fn new(registry: R, git: G, rig: &'a Rig, config: &'a OrchestratorConfig) -> Self {
        CrewManager {
            registry,
            git,
            rig,
            config,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Feature branch created for `name` by [`add`](Self::add).
    pub fn branch_name(name: &str) -> String {
        format!("crew/{}", name)
    }

    pub fn mailbox(&self, name: &str) -> JsonlMailbox {
        JsonlMailbox::new(&self.rig.crew_dir(name).join(MAIL_DIR))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.rig.crew_dir(name).is_dir()
    }

    fn identity(&self, name: &str) -> Result<(WorkerIdentity, SessionKey)> {
        let identity = WorkerIdentity::crew(&self.rig.name, name)?;
        Ok((identity, SessionKey::crew(&self.rig.name, name)))
    }

    fn require_exists(&self, name: &str) -> Result<()> {
        if self.exists(name) {
            Ok(())
        } else {
            Err(Error::WorkerNotFound {
                rig: self.rig.name.clone(),
                name: name.to_string(),
            })
        }
    }

    fn has_session(&self, key: &SessionKey) -> Result<bool> {
        self.registry
            .has_session(key.as_str())
            .map_err(Error::registry("checking session"))
    }

    /// Create the session, set identity variables, launch the crew command.
    fn launch(&self, identity: &WorkerIdentity, key: &SessionKey, work_dir: &Path) -> Result<()> {
        self.registry
            .new_session(key.as_str(), work_dir)
            .map_err(Error::registry("creating session"))?;
        for (var, value) in identity.env_vars() {
            self.registry
                .set_environment(key.as_str(), var, &value)
                .map_err(Error::registry("setting environment"))?;
        }
        self.registry
            .send_keys(key.as_str(), &self.config.crew_command)
            .map_err(Error::registry("sending command"))?;
        Ok(())
    }

    // -- workspaces ---------------------------------------------------------

    /// Provision a new crew workspace: a fresh clone of the rig repository,
    /// an optional `crew/{name}` branch, and an empty mail directory.
    pub fn add(&self, name: &str, with_branch: bool) -> Result<CrewWorker> {
        self.identity(name)?;
        let dir = self.rig.crew_dir(name);
        if dir.exists() {
            return Err(Error::WorkerExists {
                rig: self.rig.name.clone(),
                name: name.to_string(),
            });
        }
        let url = self.rig.git_url.as_deref().ok_or_else(|| Error::Config {
            path: self.rig.path.join(RIG_CONFIG_FILE),
            message: "rig has no git_url to clone crew workspaces from".to_string(),
        })?;

        fs::create_dir_all(self.rig.crew_root()).map_err(Error::io("creating", self.rig.crew_root()))?;

        debug!(rig = %self.rig.name, crew = name, url, "cloning crew workspace");
        if let Err(e) = self.git.clone_repo(url, &dir) {
            if dir.exists() {
                if let Err(cleanup) = fs::remove_dir_all(&dir) {
                    warn!(path = %dir.display(), error = %cleanup, "could not remove partial clone");
                }
            }
            return Err(Error::SourceControl {
                op: "cloning repository",
                source: e,
            });
        }

        if with_branch {
            self.git
                .create_branch(&dir, &Self::branch_name(name))
                .map_err(Error::git("creating branch"))?;
        }

        let mail = dir.join(MAIL_DIR);
        fs::create_dir_all(&mail).map_err(Error::io("creating", &mail))?;

        info!(rig = %self.rig.name, crew = name, branch = with_branch, "crew workspace added");
        self.get(name)
    }

    /// Delete a crew workspace. Without `force`, a live session or
    /// uncommitted changes block removal.
    pub fn remove(&self, name: &str, force: bool) -> Result<()> {
        let (_, key) = self.identity(name)?;
        self.require_exists(name)?;
        let dir = self.rig.crew_dir(name);
        let running = self.has_session(&key)?;

        if !force {
            if running {
                return Err(Error::SessionRunning(key.to_string()));
            }
            let status = self
                .git
                .status(&dir)
                .map_err(Error::git("checking workspace status"))?;
            if !status.is_clean() {
                return Err(Error::HasChanges {
                    rig: self.rig.name.clone(),
                    name: name.to_string(),
                });
            }
        }

        if running {
            self.registry
                .kill_session(key.as_str())
                .map_err(Error::registry("killing session"))?;
        }
        fs::remove_dir_all(&dir).map_err(Error::io("removing", &dir))?;
        info!(rig = %self.rig.name, crew = name, force, "crew workspace removed");
        Ok(())
    }

    /// Branch checked out in `dir`, or [`UNKNOWN_BRANCH`] when git cannot
    /// tell. A broken clone still shows up in listings and status.
    fn branch_of(&self, dir: &Path) -> String {
        match self.git.current_branch(dir) {
            Ok(branch) => branch,
            Err(e) => {
                debug!(path = %dir.display(), error = %e, "branch unavailable");
                UNKNOWN_BRANCH.to_string()
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<CrewWorker> {
        self.identity(name)?;
        self.require_exists(name)?;
        let clone_path = self.rig.crew_dir(name);
        let branch = self.branch_of(&clone_path);
        Ok(CrewWorker {
            name: name.to_string(),
            rig: self.rig.name.clone(),
            clone_path,
            branch,
        })
    }

    /// Every crew workspace of the rig, sorted by name.
    pub fn list(&self) -> Result<Vec<CrewWorker>> {
        list_subdirs(&self.rig.crew_root())?
            .iter()
            .map(|name| self.get(name))
            .collect()
    }

    // -- sessions -----------------------------------------------------------

    /// Attach to the worker's session, starting one first if needed.
    pub fn at(&self, name: &str) -> Result<()> {
        let (identity, key) = self.identity(name)?;
        self.require_exists(name)?;
        if !self.has_session(&key)? {
            self.launch(&identity, &key, &self.rig.crew_dir(name))?;
            info!(rig = %self.rig.name, crew = name, session = %key, "crew session started");
        }
        self.registry
            .attach_session(key.as_str())
            .map_err(Error::registry("attaching session"))
    }

    /// Cycle the worker's process: leave a handoff in its own mailbox, kill
    /// whatever session it has, and launch a fresh one that will read the
    /// handoff at startup.
    pub fn refresh(&self, name: &str, message: Option<&str>) -> Result<SessionKey> {
        let (identity, key) = self.identity(name)?;
        self.require_exists(name)?;

        let default_body;
        let body = match message {
            Some(body) => body,
            None => {
                default_body = format!(
                    "Context refresh for {}. Check mail and beads for current work state.",
                    name
                );
                &default_body
            }
        };
        let handoff = Message::handoff(&identity.address(), body);
        self.mailbox(name)
            .append(&handoff)
            .map_err(Error::mail("sending handoff"))?;
        debug!(crew = name, id = %handoff.id, "handoff recorded");

        if self.has_session(&key)? {
            self.registry
                .kill_session(key.as_str())
                .map_err(Error::registry("killing session"))?;
        }
        self.launch(&identity, &key, &self.rig.crew_dir(name))?;
        info!(rig = %self.rig.name, crew = name, session = %key, "crew session refreshed");
        Ok(key)
    }

    // -- status -------------------------------------------------------------

    pub fn status(&self, name: &str) -> Result<CrewStatus> {
        let worker = self.get(name)?;
        let key = SessionKey::crew(&self.rig.name, name);
        let has_session = self.has_session(&key)?;

        // A workspace git cannot read is reported clean rather than failing
        // the whole status query.
        let git_status = match self.git.status(&worker.clone_path) {
            Ok(status) => status,
            Err(e) => {
                debug!(crew = name, error = %e, "git status unavailable");
                Default::default()
            }
        };

        let (mail_total, mail_unread) = self
            .mailbox(name)
            .count()
            .map_err(Error::mail("counting mail"))?;

        Ok(CrewStatus {
            name: worker.name,
            rig: worker.rig,
            path: worker.clone_path,
            branch: worker.branch,
            has_session,
            session_key: has_session.then(|| key.to_string()),
            git_clean: git_status.is_clean(),
            modified: git_status.changed(),
            untracked: git_status.untracked,
            mail_total,
            mail_unread,
        })
    }

    pub fn status_all(&self) -> Result<Vec<CrewStatus>> {
        list_subdirs(&self.rig.crew_root())?
            .iter()
            .map(|name| self.status(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::infrastructure::git::MockGit;
    use crate::infrastructure::mock::{MockRegistry, RegistryCall};
    use crate::mail::HANDOFF_SUBJECT;

    fn rig() -> (TempDir, Rig) {
        let tmp = tempfile::tempdir().unwrap();
        let mut rig = Rig::new("gastown", &tmp.path().join("gastown"));
        rig.git_url = Some("https://example.com/gastown.git".into());
        fs::create_dir_all(&rig.path).unwrap();
        (tmp, rig)
    }

    // ---- Add ----

    #[test]
    fn add_clones_branches_and_makes_mail() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let reg = MockRegistry::new();
        let git = MockGit::new();
        let mgr = CrewManager::new(&reg, &git, &rig, &cfg);

        let worker = mgr.add("dave", true).unwrap();
        assert_eq!(worker.branch, "crew/dave");
        assert_eq!(worker.clone_path, rig.crew_dir("dave"));
        assert!(rig.crew_dir("dave").join(MAIL_DIR).is_dir());
        assert_eq!(
            git.clones(),
            vec![("https://example.com/gastown.git".to_string(), rig.crew_dir("dave"))]
        );
        assert!(reg.calls().is_empty());
    }

    #[test]
    fn add_without_branch_stays_on_default() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let git = MockGit::new();
        let mgr = CrewManager::new(MockRegistry::new(), &git, &rig, &cfg);
        assert_eq!(mgr.add("dave", false).unwrap().branch, "main");
    }

    #[test]
    fn add_existing_conflicts() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let git = MockGit::new();
        let mgr = CrewManager::new(MockRegistry::new(), &git, &rig, &cfg);
        mgr.add("dave", false).unwrap();
        assert!(matches!(mgr.add("dave", false), Err(Error::WorkerExists { .. })));
        assert_eq!(git.clones().len(), 1);
    }

    #[test]
    fn failed_clone_leaves_no_directory() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let git = MockGit::new();
        git.fail_clone("authentication failed");
        let mgr = CrewManager::new(MockRegistry::new(), &git, &rig, &cfg);

        let err = mgr.add("dave", false).unwrap_err();
        assert!(matches!(err, Error::SourceControl { op: "cloning repository", .. }));
        assert!(!rig.crew_dir("dave").exists());
    }

    #[test]
    fn add_requires_git_url() {
        let (_tmp, mut rig) = rig();
        rig.git_url = None;
        let cfg = OrchestratorConfig::immediate();
        let mgr = CrewManager::new(MockRegistry::new(), MockGit::new(), &rig, &cfg);
        assert!(matches!(mgr.add("dave", false), Err(Error::Config { .. })));
    }

    // ---- Remove ----

    #[test]
    fn dirty_workspace_needs_force() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let git = MockGit::new();
        let mgr = CrewManager::new(MockRegistry::new(), &git, &rig, &cfg);
        mgr.add("dave", false).unwrap();
        git.make_dirty(&rig.crew_dir("dave"), "src/lib.rs");

        let err = mgr.remove("dave", false).unwrap_err();
        assert!(matches!(err, Error::HasChanges { .. }));
        assert!(rig.crew_dir("dave").is_dir());

        mgr.remove("dave", true).unwrap();
        assert!(!rig.crew_dir("dave").exists());
    }

    #[test]
    fn live_session_blocks_removal() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let reg = MockRegistry::with_sessions(&["gt-gastown-crew-dave"]);
        let git = MockGit::new();
        let mgr = CrewManager::new(&reg, &git, &rig, &cfg);
        mgr.add("dave", false).unwrap();

        assert!(matches!(mgr.remove("dave", false), Err(Error::SessionRunning(_))));
        assert!(rig.crew_dir("dave").is_dir());

        mgr.remove("dave", true).unwrap();
        assert!(reg.sessions().is_empty());
        assert!(!rig.crew_dir("dave").exists());
    }

    #[test]
    fn remove_clean_workspace() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let mgr = CrewManager::new(MockRegistry::new(), MockGit::new(), &rig, &cfg);
        mgr.add("dave", false).unwrap();
        mgr.remove("dave", false).unwrap();
        assert!(!mgr.exists("dave"));
        assert!(matches!(mgr.remove("dave", true), Err(Error::WorkerNotFound { .. })));
    }

    // ---- Refresh ----

    #[test]
    fn refresh_hands_off_and_relaunches() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let reg = MockRegistry::new();
        let mgr = CrewManager::new(&reg, MockGit::new(), &rig, &cfg);
        mgr.add("dave", false).unwrap();

        let key = mgr.refresh("dave", Some("resume gt-42")).unwrap();
        assert_eq!(key.as_str(), "gt-gastown-crew-dave");

        let inbox = JsonlMailbox::new(&rig.crew_dir("dave").join(MAIL_DIR)).list().unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].from, "gastown/dave");
        assert_eq!(inbox[0].to, "gastown/dave");
        assert_eq!(inbox[0].subject, HANDOFF_SUBJECT);
        assert_eq!(inbox[0].body, "resume gt-42");

        assert_eq!(
            reg.environment("gt-gastown-crew-dave"),
            vec![
                ("GT_RIG".to_string(), "gastown".to_string()),
                ("GT_CREW".to_string(), "dave".to_string()),
            ]
        );
        assert_eq!(
            reg.calls().last(),
            Some(&RegistryCall::SendKeys {
                key: "gt-gastown-crew-dave".into(),
                text: "claude".into(),
            })
        );
    }

    #[test]
    fn refresh_kills_existing_session_first() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let reg = MockRegistry::with_sessions(&["gt-gastown-crew-dave"]);
        let mgr = CrewManager::new(&reg, MockGit::new(), &rig, &cfg);
        mgr.add("dave", false).unwrap();

        mgr.refresh("dave", None).unwrap();
        let calls = reg.calls();
        assert_eq!(calls[0], RegistryCall::KillSession { key: "gt-gastown-crew-dave".into() });
        assert!(matches!(calls[1], RegistryCall::NewSession { .. }));
        assert_eq!(reg.sessions(), vec!["gt-gastown-crew-dave"]);

        let inbox = mgr.mailbox("dave").list().unwrap();
        assert_eq!(
            inbox[0].body,
            "Context refresh for dave. Check mail and beads for current work state."
        );
    }

    #[test]
    fn refresh_unknown_worker() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let reg = MockRegistry::new();
        let mgr = CrewManager::new(&reg, MockGit::new(), &rig, &cfg);
        assert!(matches!(mgr.refresh("ghost", None), Err(Error::WorkerNotFound { .. })));
        assert!(reg.calls().is_empty());
    }

    #[test]
    fn handoff_survives_relaunch_failure() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let reg = MockRegistry::new();
        reg.fail("new_session", "no server");
        let mgr = CrewManager::new(&reg, MockGit::new(), &rig, &cfg);
        mgr.add("dave", false).unwrap();

        assert!(mgr.refresh("dave", Some("carry on")).is_err());
        assert_eq!(mgr.mailbox("dave").count().unwrap(), (1, 1));
    }

    // ---- At ----

    #[test]
    fn at_starts_missing_session_then_attaches() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let reg = MockRegistry::new();
        let mgr = CrewManager::new(&reg, MockGit::new(), &rig, &cfg);
        mgr.add("dave", false).unwrap();

        mgr.at("dave").unwrap();
        let calls = reg.calls();
        assert_eq!(
            calls[0],
            RegistryCall::NewSession {
                key: "gt-gastown-crew-dave".into(),
                work_dir: rig.crew_dir("dave"),
            }
        );
        assert_eq!(calls.last(), Some(&RegistryCall::Attach { key: "gt-gastown-crew-dave".into() }));

        reg.clear_calls();
        mgr.at("dave").unwrap();
        assert_eq!(reg.calls(), vec![RegistryCall::Attach { key: "gt-gastown-crew-dave".into() }]);
    }

    // ---- List / status ----

    #[test]
    fn list_is_sorted_and_directory_backed() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let mgr = CrewManager::new(MockRegistry::new(), MockGit::new(), &rig, &cfg);
        assert!(mgr.list().unwrap().is_empty());
        mgr.add("zed", false).unwrap();
        mgr.add("amy", false).unwrap();
        let names: Vec<String> = mgr.list().unwrap().into_iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["amy", "zed"]);
    }

    #[test]
    fn status_reports_session_git_and_mail() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let reg = MockRegistry::new();
        let git = MockGit::new();
        let mgr = CrewManager::new(&reg, &git, &rig, &cfg);
        mgr.add("dave", true).unwrap();

        let idle = mgr.status("dave").unwrap();
        assert!(!idle.has_session);
        assert_eq!(idle.session_key, None);
        assert!(idle.git_clean);
        assert_eq!((idle.mail_total, idle.mail_unread), (0, 0));

        git.make_dirty(&rig.crew_dir("dave"), "notes.md");
        mgr.refresh("dave", None).unwrap();
        let busy = mgr.status("dave").unwrap();
        assert!(busy.has_session);
        assert_eq!(busy.session_key.as_deref(), Some("gt-gastown-crew-dave"));
        assert!(!busy.git_clean);
        assert_eq!(busy.modified, vec!["notes.md"]);
        assert_eq!(busy.branch, "crew/dave");
        assert_eq!((busy.mail_total, busy.mail_unread), (1, 1));
    }

    #[test]
    fn unreadable_workspace_still_reports() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let git = MockGit::new();
        let mgr = CrewManager::new(MockRegistry::new(), &git, &rig, &cfg);
        mgr.add("dave", true).unwrap();
        git.fail_status("not a git repository");
        git.fail_branch("not a git repository");

        let status = mgr.status("dave").unwrap();
        assert!(status.git_clean);
        assert_eq!(status.branch, UNKNOWN_BRANCH);
        assert!(status.modified.is_empty());
        assert_eq!(mgr.list().unwrap()[0].branch, UNKNOWN_BRANCH);
        assert_eq!(mgr.status_all().unwrap().len(), 1);
    }

    #[test]
    fn status_over_failing_git_cli() {
        use crate::infrastructure::git::GitCli;
        use crate::infrastructure::runner::MockRunner;

        let (_tmp, rig) = rig();
        fs::create_dir_all(rig.crew_dir("dave")).unwrap();
        let cfg = OrchestratorConfig::immediate();
        let failures = (0..4).map(|_| Err("fatal: not a git repository".to_string())).collect();
        let git = GitCli::new(MockRunner::with_responses(failures));
        let mgr = CrewManager::new(MockRegistry::new(), git, &rig, &cfg);

        let status = mgr.status("dave").unwrap();
        assert!(status.git_clean);
        assert_eq!(status.branch, UNKNOWN_BRANCH);
    }

    #[test]
    fn nested_name_cannot_reach_into_another_workspace() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let mgr = CrewManager::new(MockRegistry::new(), MockGit::new(), &rig, &cfg);
        mgr.add("dave", false).unwrap();
        fs::create_dir_all(rig.crew_dir("dave").join("src")).unwrap();

        assert!(matches!(mgr.remove("dave/src", false), Err(Error::InvalidName { .. })));
        assert!(matches!(mgr.remove("dave/src", true), Err(Error::InvalidName { .. })));
        assert!(rig.crew_dir("dave").join("src").is_dir());
        assert!(matches!(mgr.refresh("dave/src", None), Err(Error::InvalidName { .. })));
    }

    #[test]
    fn status_tolerates_git_failure() {
        let (_tmp, rig) = rig();
        let cfg = OrchestratorConfig::immediate();
        let git = MockGit::new();
        let mgr = CrewManager::new(MockRegistry::new(), &git, &rig, &cfg);
        mgr.add("dave", false).unwrap();
        git.fail_status("not a git repository");
        assert!(mgr.status("dave").unwrap().git_clean);
        assert_eq!(mgr.status_all().unwrap().len(), 1);
    }
}
