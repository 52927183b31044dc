//! gt: command-line entry point for Gas Town worker lifecycle control.
//!
//! # Usage
//!
//! ```text
//! gt polecat start --rig gastown joe --issue gt-123
//! gt polecat list --rig gastown
//! gt crew refresh --rig gastown dave -m "pick up the auth refactor"
//! gt witness status --rig gastown --json
//! ```

mod args;
mod run;

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gastown_core::infrastructure::git::GitCli;
use gastown_core::infrastructure::process::SystemProcesses;
use gastown_core::infrastructure::runner::ShellRunner;
use gastown_core::infrastructure::tmux::TmuxRegistry;
use gastown_core::{CrewManager, ErrorKind, OrchestratorConfig, PolecatManager, Rig, WitnessManager};

use args::{Cli, Commands};
use run::Report;

const DEFAULT_CONFIG_FILE: &str = "gastown.yaml";

fn main() {
    let cli = Cli::parse();
    init_logging();

    let as_json = cli.json;
    let result = execute(cli).and_then(|report| report.render(as_json));
    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("gt: {:#}", e);
            process::exit(exit_code(&e));
        }
    }
}

/// Logs go to stderr so `--json` output stays machine-readable.
/// `RUST_LOG` filters; `GT_LOG_JSON=1` switches to JSON lines.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gastown_core=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if std::env::var("GT_LOG_JSON").map(|v| v == "1").unwrap_or(false) {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn resolve_town(cli: &Cli) -> anyhow::Result<PathBuf> {
    match &cli.town {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().context("resolving town root"),
    }
}

fn execute(cli: Cli) -> anyhow::Result<Report> {
    let town = resolve_town(&cli)?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| town.join(DEFAULT_CONFIG_FILE));
    let config = OrchestratorConfig::load(&config_path)?;
    let rig = Rig::discover(&town, cli.command.rig())?;
    tracing::debug!(town = %town.display(), rig = %rig.name, "resolved rig");

    let registry = TmuxRegistry::new(ShellRunner, config.timings.confirm_delay());
    match cli.command {
        Commands::Polecat(cmd) => run::polecat(cmd, &PolecatManager::new(registry, &rig, &config)),
        Commands::Crew(cmd) => run::crew(
            cmd,
            &CrewManager::new(registry, GitCli::new(ShellRunner), &rig, &config),
        ),
        Commands::Witness(cmd) => run::witness(cmd, &WitnessManager::new(&rig, SystemProcesses)),
    }
}

/// 3 not found, 4 conflict, 5 wrong state, 1 anything else.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<gastown_core::Error>().map(|e| e.kind()) {
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::Conflict) => 4,
        Some(ErrorKind::Precondition) => 5,
        _ => 1,
    }
}
