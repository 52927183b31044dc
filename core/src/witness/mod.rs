//! Per-rig witness: a two-state lifecycle persisted as one JSON document.

mod manager;
mod state;

pub use manager::WitnessManager;
pub use state::{State, WitnessState, STATE_FILE};
