use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

pub const DEFAULT_CAPTURE_LINES: u32 = 50;

#[derive(Debug, Parser)]
#[command(name = "gt")]
#[command(about = "Lifecycle control for terminal-hosted agent workers.")]
pub struct Cli {
    /// Town root containing one directory per rig.
    #[arg(long, env = "GT_TOWN", global = true)]
    pub town: Option<PathBuf>,
    /// YAML file overriding launch commands and timings.
    #[arg(long, env = "GT_CONFIG", global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ephemeral workers.
    #[command(subcommand)]
    Polecat(PolecatCommand),
    /// Persistent workers.
    #[command(subcommand)]
    Crew(CrewCommand),
    /// The per-rig witness.
    #[command(subcommand)]
    Witness(WitnessCommand),
}

#[derive(Debug, Args)]
pub struct Target {
    #[arg(long)]
    pub rig: String,
    pub name: String,
}

#[derive(Debug, Args)]
pub struct RigArg {
    #[arg(long)]
    pub rig: String,
}

#[derive(Debug, Subcommand)]
pub enum PolecatCommand {
    Start {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        issue: Option<String>,
        #[arg(long)]
        command: Option<String>,
        #[arg(long = "work-dir")]
        work_dir: Option<PathBuf>,
    },
    Stop {
        #[command(flatten)]
        target: Target,
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    StopAll {
        #[command(flatten)]
        rig: RigArg,
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    List(RigArg),
    Status(Target),
    Attach(Target),
    Capture {
        #[command(flatten)]
        target: Target,
        #[arg(long, default_value_t = DEFAULT_CAPTURE_LINES)]
        lines: u32,
    },
    Inject {
        #[command(flatten)]
        target: Target,
        message: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum CrewCommand {
    Add {
        #[command(flatten)]
        target: Target,
        /// Also create and check out `crew/<name>`.
        #[arg(long, action = ArgAction::SetTrue)]
        branch: bool,
    },
    List(RigArg),
    At {
        #[command(flatten)]
        target: Target,
        /// Print the workspace path instead of attaching.
        #[arg(long = "no-tmux", action = ArgAction::SetTrue)]
        no_tmux: bool,
    },
    Remove {
        #[command(flatten)]
        target: Target,
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    Refresh {
        #[command(flatten)]
        target: Target,
        #[arg(long, short = 'm')]
        message: Option<String>,
    },
    Status {
        #[command(flatten)]
        rig: RigArg,
        name: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum WitnessCommand {
    Start(RigArg),
    Stop(RigArg),
    Status(RigArg),
}

impl Commands {
    pub fn rig(&self) -> &str {
        match self {
            Commands::Polecat(cmd) => match cmd {
                PolecatCommand::Start { target, .. }
                | PolecatCommand::Stop { target, .. }
                | PolecatCommand::Capture { target, .. }
                | PolecatCommand::Inject { target, .. }
                | PolecatCommand::Status(target)
                | PolecatCommand::Attach(target) => &target.rig,
                PolecatCommand::StopAll { rig, .. } | PolecatCommand::List(rig) => &rig.rig,
            },
            Commands::Crew(cmd) => match cmd {
                CrewCommand::Add { target, .. }
                | CrewCommand::Remove { target, .. }
                | CrewCommand::Refresh { target, .. }
                | CrewCommand::At { target, .. } => &target.rig,
                CrewCommand::List(rig) | CrewCommand::Status { rig, .. } => &rig.rig,
            },
            Commands::Witness(cmd) => match cmd {
                WitnessCommand::Start(rig) | WitnessCommand::Stop(rig) | WitnessCommand::Status(rig) => {
                    &rig.rig
                }
            },
        }
    }
}
