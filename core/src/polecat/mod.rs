//! Ephemeral, witness-managed workers.

mod manager;

pub use manager::{PolecatManager, INTERRUPT_KEYS};
