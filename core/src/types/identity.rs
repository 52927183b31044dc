//! Worker identity and session addressing.
//!
//! Session keys live in one flat registry namespace:
//!
//! - polecat: `gt-{rig}-{name}`
//! - crew:    `gt-{rig}-crew-{name}`
//!
//! The `crew-` infix is reserved. Polecat names may not begin with it, so a
//! key of the form `gt-{rig}-crew-{x}` always denotes crew worker `x` and the
//! reverse mapping never has two answers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const SESSION_PREFIX: &str = "gt";
pub const CREW_INFIX: &str = "crew-";

pub const ENV_RIG: &str = "GT_RIG";
pub const ENV_POLECAT: &str = "GT_POLECAT";
pub const ENV_CREW: &str = "GT_CREW";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Polecat,
    Crew,
    Witness,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Polecat => "polecat",
            Role::Crew => "crew",
            Role::Witness => "witness",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerIdentity {
    role: Role,
    rig: String,
    name: Option<String>,
}

impl WorkerIdentity {
    pub fn polecat(rig: &str, name: &str) -> Result<Self> {
        validate(rig)?;
        validate(name)?;
        if name.starts_with(CREW_INFIX) {
            return Err(Error::InvalidName {
                name: name.to_string(),
                reason: "the 'crew-' prefix is reserved for crew sessions",
            });
        }
        Ok(WorkerIdentity {
            role: Role::Polecat,
            rig: rig.to_string(),
            name: Some(name.to_string()),
        })
    }

    pub fn crew(rig: &str, name: &str) -> Result<Self> {
        validate(rig)?;
        validate(name)?;
        Ok(WorkerIdentity {
            role: Role::Crew,
            rig: rig.to_string(),
            name: Some(name.to_string()),
        })
    }

    pub fn witness(rig: &str) -> Result<Self> {
        validate(rig)?;
        Ok(WorkerIdentity {
            role: Role::Witness,
            rig: rig.to_string(),
            name: None,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn rig(&self) -> &str {
        &self.rig
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Registry key for this identity. The witness hosts no session.
    pub fn session_key(&self) -> Option<SessionKey> {
        let name = self.name.as_deref()?;
        match self.role {
            Role::Polecat => Some(SessionKey::polecat(&self.rig, name)),
            Role::Crew => Some(SessionKey::crew(&self.rig, name)),
            Role::Witness => None,
        }
    }

    /// Mail address, `{rig}/{name}` (or `{rig}/witness`).
    pub fn address(&self) -> String {
        match &self.name {
            Some(name) => format!("{}/{}", self.rig, name),
            None => format!("{}/{}", self.rig, self.role),
        }
    }

    /// Identity variables set into a session before its launch command runs.
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![(ENV_RIG, self.rig.clone())];
        match (self.role, &self.name) {
            (Role::Polecat, Some(name)) => vars.push((ENV_POLECAT, name.clone())),
            (Role::Crew, Some(name)) => vars.push((ENV_CREW, name.clone())),
            _ => {}
        }
        vars
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.role, self.address())
    }
}

/// Reject names that cannot be embedded in a tmux target unambiguously or
/// used as a single path component.
fn validate(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.chars().any(char::is_whitespace) {
        Some("must not contain whitespace")
    } else if name.contains('.') || name.contains(':') {
        Some("must not contain '.' or ':'")
    } else if name.contains('/') || name.contains('\\') {
        Some("must not contain a path separator")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(Error::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}


// ---------------------------------------------------------------------------
// SessionKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// `gt-{rig}-`, shared by every session key of the rig.
    pub fn rig_prefix(rig: &str) -> String {
        format!("{}-{}-", SESSION_PREFIX, rig)
    }

    /// `gt-{rig}-{name}`. Callers are expected to have validated the
    /// identity through [`WorkerIdentity::polecat`].
    pub fn polecat(rig: &str, name: &str) -> Self {
        SessionKey(format!("{}{}", Self::rig_prefix(rig), name))
    }

    /// `gt-{rig}-crew-{name}`
    pub fn crew(rig: &str, name: &str) -> Self {
        SessionKey(format!("{}{}{}", Self::rig_prefix(rig), CREW_INFIX, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the identity behind a registry key, given the rig it should
    /// belong to. Returns `None` for keys outside the rig's prefix or with an
    /// empty name.
    pub fn parse(rig: &str, key: &str) -> Option<WorkerIdentity> {
        let rest = key.strip_prefix(&Self::rig_prefix(rig))?;
        let (role, name) = match rest.strip_prefix(CREW_INFIX) {
            Some(crew) => (Role::Crew, crew),
            None => (Role::Polecat, rest),
        };
        if name.is_empty() {
            return None;
        }
        Some(WorkerIdentity {
            role,
            rig: rig.to_string(),
            name: Some(name.to_string()),
        })
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
