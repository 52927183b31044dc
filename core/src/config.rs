//! Orchestrator configuration.
//!
//! One `OrchestratorConfig` value is built per invocation and handed to each
//! manager by reference. The fixed delays below were tuned against one
//! multiplexer/agent pairing; they live here so a different pairing can
//! override them from YAML without touching the managers.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Launch command for polecats. Polecats run with full permissions.
pub const DEFAULT_POLECAT_COMMAND: &str = "claude --dangerously-skip-permissions";

/// Launch command for crew workers.
pub const DEFAULT_CREW_COMMAND: &str = "claude";


// ---------------------------------------------------------------------------
// DebouncePolicy
// ---------------------------------------------------------------------------

/// Settle time before the confirming Enter of an injected message.
///
/// The hosted process consumes pasted text asynchronously, so larger payloads
/// get proportionally more time, bounded by `max_ms`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DebouncePolicy {
    pub base_ms: u64,
    pub per_kib_ms: u64,
    pub max_ms: u64,
}

impl DebouncePolicy {
    /// `min(base + floor(len / 1024) * per_kib, max)`
    pub fn delay_ms(&self, message_len: usize) -> u64 {
        let kib = (message_len / 1024) as u64;
        self.base_ms
            .saturating_add(kib.saturating_mul(self.per_kib_ms))
            .min(self.max_ms)
    }

    pub fn delay(&self, message_len: usize) -> Duration {
        Duration::from_millis(self.delay_ms(message_len))
    }
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        DebouncePolicy {
            base_ms: 200,
            per_kib_ms: 100,
            max_ms: 1500,
        }
    }
}


// ---------------------------------------------------------------------------
// Timings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timings {
    /// Wait between launching the agent and sending the issue follow-up.
    pub issue_settle_ms: u64,
    /// Wait between the courtesy interrupt and the hard kill.
    pub graceful_stop_ms: u64,
    /// Wait between typed text and Enter in a confirmed send.
    pub confirm_delay_ms: u64,
    pub inject: DebouncePolicy,
}

impl Timings {
    pub fn issue_settle(&self) -> Duration {
        Duration::from_millis(self.issue_settle_ms)
    }

    pub fn graceful_stop(&self) -> Duration {
        Duration::from_millis(self.graceful_stop_ms)
    }

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            issue_settle_ms: 500,
            graceful_stop_ms: 100,
            confirm_delay_ms: 100,
            inject: DebouncePolicy::default(),
        }
    }
}


// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub polecat_command: String,
    pub crew_command: String,
    pub timings: Timings,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            polecat_command: DEFAULT_POLECAT_COMMAND.to_string(),
            crew_command: DEFAULT_CREW_COMMAND.to_string(),
            timings: Timings::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load from a YAML file. A missing file yields the defaults; fields
    /// absent from the file keep their default values.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&contents).map_err(|message| Error::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_yaml(contents: &str) -> std::result::Result<Self, String> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(|e| e.to_string())
    }

    /// Same commands, no manager-side sleeps. The inject policy is kept: it
    /// only becomes a sleep inside the registry.
    pub fn immediate() -> Self {
        OrchestratorConfig {
            timings: Timings {
                issue_settle_ms: 0,
                graceful_stop_ms: 0,
                confirm_delay_ms: 0,
                inject: DebouncePolicy::default(),
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Debounce ----

    #[test]
    fn debounce_reference_points() {
        let policy = DebouncePolicy::default();
        assert_eq!(policy.delay_ms(0), 200);
        assert_eq!(policy.delay_ms(1023), 200);
        assert_eq!(policy.delay_ms(1024), 300);
        assert_eq!(policy.delay_ms(10240), 1200);
        assert_eq!(policy.delay_ms(100_000), 1500);
    }

    #[test]
    fn debounce_is_monotonic_and_capped() {
        let policy = DebouncePolicy::default();
        let mut last = 0;
        for len in (0..40_000).step_by(333) {
            let d = policy.delay_ms(len);
            assert!(d >= last, "delay decreased at len {}", len);
            assert!(d <= policy.max_ms);
            last = d;
        }
    }

    #[test]
    fn debounce_survives_huge_lengths() {
        let policy = DebouncePolicy::default();
        assert_eq!(policy.delay_ms(usize::MAX), 1500);
    }

    // ---- Loading ----

    #[test]
    fn defaults_match_tuned_values() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.polecat_command, DEFAULT_POLECAT_COMMAND);
        assert_eq!(cfg.crew_command, "claude");
        assert_eq!(cfg.timings.issue_settle(), Duration::from_millis(500));
        assert_eq!(cfg.timings.graceful_stop(), Duration::from_millis(100));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = OrchestratorConfig::from_yaml(
            "crew_command: claude --resume\ntimings:\n  graceful_stop_ms: 250\n",
        )
        .unwrap();
        assert_eq!(cfg.crew_command, "claude --resume");
        assert_eq!(cfg.polecat_command, DEFAULT_POLECAT_COMMAND);
        assert_eq!(cfg.timings.graceful_stop_ms, 250);
        assert_eq!(cfg.timings.issue_settle_ms, 500);
        assert_eq!(cfg.timings.inject, DebouncePolicy::default());
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(OrchestratorConfig::from_yaml("  \n").unwrap(), OrchestratorConfig::default());
    }

    #[test]
    fn load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = OrchestratorConfig::load(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(cfg, OrchestratorConfig::default());
    }

    #[test]
    fn load_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gt.yaml");
        fs::write(&path, "timings: [1, 2").unwrap();
        let err = OrchestratorConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn immediate_zeroes_delays() {
        let cfg = OrchestratorConfig::immediate();
        assert_eq!(cfg.timings.issue_settle_ms, 0);
        assert_eq!(cfg.timings.graceful_stop_ms, 0);
        assert_eq!(cfg.timings.confirm_delay_ms, 0);
        assert_eq!(cfg.crew_command, DEFAULT_CREW_COMMAND);
    }
}
