//! Command dispatch. Each handler takes an already-built manager so the
//! whole surface can be exercised against in-memory collaborators.

use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};

use gastown_core::crew::{CrewManager, CrewStatus};
use gastown_core::infrastructure::git::SourceControl;
use gastown_core::infrastructure::process::ProcessControl;
use gastown_core::infrastructure::Registry;
use gastown_core::polecat::PolecatManager;
use gastown_core::types::session::StartOptions;
use gastown_core::witness::{State, WitnessManager, WitnessState};

use crate::args::{CrewCommand, PolecatCommand, WitnessCommand};

/// What a command produced, in both output forms.
#[derive(Debug)]
pub struct Report {
    pub text: String,
    pub json: Value,
}

impl Report {
    fn new<T: Serialize>(text: impl Into<String>, value: &T) -> Result<Self> {
        Ok(Report {
            text: text.into(),
            json: serde_json::to_value(value)?,
        })
    }

    fn done(text: impl Into<String>) -> Self {
        let text = text.into();
        Report {
            json: json!({ "ok": true, "message": text }),
            text,
        }
    }

    pub fn render(&self, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(&self.json)?)
        } else {
            Ok(self.text.clone())
        }
    }
}

pub fn polecat<R: Registry>(cmd: PolecatCommand, mgr: &PolecatManager<'_, R>) -> Result<Report> {
    match cmd {
        PolecatCommand::Start {
            target,
            issue,
            command,
            work_dir,
        } => {
            let opts = StartOptions {
                work_dir,
                issue,
                command,
            };
            let key = mgr.start(&target.name, &opts)?;
            Report::new(format!("Started {} ({})", target.name, key), &json!({ "session_key": key }))
        }
        PolecatCommand::Stop { target, force } => {
            mgr.stop(&target.name, force)?;
            Ok(Report::done(format!("Stopped {}", target.name)))
        }
        PolecatCommand::StopAll { force, .. } => {
            mgr.stop_all(force)?;
            Ok(Report::done("Stopped all polecat sessions"))
        }
        PolecatCommand::List(_) => {
            let infos = mgr.list()?;
            let mut text = String::new();
            if infos.is_empty() {
                text.push_str("No polecat sessions running");
            }
            for info in &infos {
                let _ = writeln!(text, "{:<16} {}", info.worker, info.session_key);
            }
            Report::new(text.trim_end(), &infos)
        }
        PolecatCommand::Status(target) => {
            let info = mgr.status(&target.name)?;
            let state = if info.running { "running" } else { "stopped" };
            Report::new(format!("{} {} ({})", info.worker, state, info.session_key), &info)
        }
        PolecatCommand::Attach(target) => {
            mgr.attach(&target.name)?;
            Ok(Report::done(format!("Detached from {}", target.name)))
        }
        PolecatCommand::Capture { target, lines } => {
            let content = mgr.capture(&target.name, lines)?;
            Report::new(content.clone(), &json!({ "content": content }))
        }
        PolecatCommand::Inject { target, message } => {
            mgr.inject(&target.name, &message)?;
            Ok(Report::done(format!("Injected message into {}", target.name)))
        }
    }
}

fn crew_status_text(status: &CrewStatus) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "{}/{}", status.rig, status.name);
    let _ = writeln!(text, "  path:    {}", status.path.display());
    let _ = writeln!(text, "  branch:  {}", status.branch);
    match &status.session_key {
        Some(key) => {
            let _ = writeln!(text, "  session: {}", key);
        }
        None => text.push_str("  session: none\n"),
    }
    if status.git_clean {
        text.push_str("  git:     clean\n");
    } else {
        let _ = writeln!(
            text,
            "  git:     {} changed, {} untracked",
            status.modified.len(),
            status.untracked.len()
        );
    }
    let _ = write!(text, "  mail:    {} ({} unread)", status.mail_total, status.mail_unread);
    text
}

pub fn crew<R: Registry, G: SourceControl>(
    cmd: CrewCommand,
    mgr: &CrewManager<'_, R, G>,
) -> Result<Report> {
    match cmd {
        CrewCommand::Add { target, branch } => {
            let worker = mgr.add(&target.name, branch)?;
            Report::new(
                format!("Created crew workspace {} on {}", worker.clone_path.display(), worker.branch),
                &worker,
            )
        }
        CrewCommand::List(_) => {
            let workers = mgr.list()?;
            let mut text = String::new();
            if workers.is_empty() {
                text.push_str("No crew workspaces");
            }
            for worker in &workers {
                let _ = writeln!(text, "{:<16} {}", worker.name, worker.branch);
            }
            Report::new(text.trim_end(), &workers)
        }
        CrewCommand::At { target, no_tmux: true } => {
            let worker = mgr.get(&target.name)?;
            Report::new(worker.clone_path.display().to_string(), &worker)
        }
        CrewCommand::At { target, .. } => {
            mgr.at(&target.name)?;
            Ok(Report::done(format!("Detached from {}", target.name)))
        }
        CrewCommand::Remove { target, force } => {
            mgr.remove(&target.name, force)?;
            Ok(Report::done(format!("Removed crew workspace {}", target.name)))
        }
        CrewCommand::Refresh { target, message } => {
            let key = mgr.refresh(&target.name, message.as_deref())?;
            Report::new(
                format!("Refreshed {} ({})", target.name, key),
                &json!({ "session_key": key }),
            )
        }
        CrewCommand::Status { name: Some(name), .. } => {
            let status = mgr.status(&name)?;
            Report::new(crew_status_text(&status), &status)
        }
        CrewCommand::Status { name: None, .. } => {
            let all = mgr.status_all()?;
            let text = if all.is_empty() {
                "No crew workspaces".to_string()
            } else {
                all.iter().map(crew_status_text).collect::<Vec<_>>().join("\n")
            };
            Report::new(text, &all)
        }
    }
}

fn witness_text(state: &WitnessState) -> String {
    match state.state {
        State::Running => {
            let since = state
                .started_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            format!(
                "Witness for {}: running (pid {}, since {}), monitoring {} polecat(s)",
                state.rig_name,
                state.pid,
                since,
                state.monitored_polecats.len()
            )
        }
        State::Stopped => format!("Witness for {}: stopped", state.rig_name),
    }
}

pub fn witness<P: ProcessControl>(cmd: WitnessCommand, mgr: &WitnessManager<'_, P>) -> Result<Report> {
    let state = match cmd {
        WitnessCommand::Start(_) => mgr.start()?,
        WitnessCommand::Stop(_) => mgr.stop()?,
        WitnessCommand::Status(_) => mgr.status()?,
    };
    Report::new(witness_text(&state), &state)
}
