//! Gas Town core: lifecycle orchestration for terminal-hosted agent workers.
//!
//! Workers are bound to a rig (a managed clone of a project repository) and
//! come in three roles. Polecats are ephemeral and witness-managed, crew
//! workers are persistent and user-managed, and the witness is a monitoring
//! role tracked through an on-disk state machine rather than a live session.
//!
//! Every external mechanism sits behind a trait so the managers can be driven
//! against in-memory fakes:
//!
//! - [`infrastructure::Registry`] hosts interactive sessions (tmux in production)
//! - [`mail::Mailbox`] stores durable handoff messages
//! - [`infrastructure::git::SourceControl`] provisions and inspects clones
//! - [`infrastructure::process::ProcessControl`] probes and signals pids

pub mod config;
pub mod crew;
pub mod error;
pub mod infrastructure;
pub mod mail;
pub mod polecat;
pub mod rig;
pub mod types;
pub mod witness;

pub use config::OrchestratorConfig;
pub use error::{Error, ErrorKind, Result};
pub use types::identity::{Role, SessionKey, WorkerIdentity};
pub use crew::CrewManager;
pub use polecat::PolecatManager;
pub use rig::Rig;
pub use witness::WitnessManager;
