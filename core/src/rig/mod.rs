//! Rig descriptor: a managed project clone plus its worker workspaces.
//!
//! This core only reads rigs. On disk a rig looks like:
//!
//! ```text
//! <town>/<rig>/
//!     config.json          {"git_url": "..."}   (optional)
//!     polecats/<name>/     one clone per polecat
//!     crew/<name>/         one clone per crew worker, with mail/
//!     .runtime/witness.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const RIG_CONFIG_FILE: &str = "config.json";
pub const POLECATS_DIR: &str = "polecats";
pub const CREW_DIR: &str = "crew";
pub const RUNTIME_DIR: &str = ".runtime";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rig {
    pub name: String,
    pub path: PathBuf,
    pub git_url: Option<String>,
    /// Known polecat names, sorted.
    pub polecats: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RigFile {
    #[serde(default)]
    git_url: Option<String>,
}

impl Rig {
    pub fn new(name: &str, path: &Path) -> Self {
        Rig {
            name: name.to_string(),
            path: path.to_path_buf(),
            git_url: None,
            polecats: Vec::new(),
        }
    }

    /// Read the rig `name` under `town_root` from disk.
    pub fn discover(town_root: &Path, name: &str) -> Result<Self> {
        let path = town_root.join(name);
        if !path.is_dir() {
            return Err(Error::RigNotFound(path));
        }
        let mut rig = Rig::new(name, &path);

        let config_path = path.join(RIG_CONFIG_FILE);
        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).map_err(Error::io("reading", &config_path))?;
            let file: RigFile = serde_json::from_str(&contents).map_err(|e| Error::Config {
                path: config_path.clone(),
                message: e.to_string(),
            })?;
            rig.git_url = file.git_url;
        }

        rig.polecats = list_subdirs(&rig.polecats_root())?;
        Ok(rig)
    }

    pub fn polecats_root(&self) -> PathBuf {
        self.path.join(POLECATS_DIR)
    }

    pub fn polecat_dir(&self, name: &str) -> PathBuf {
        self.polecats_root().join(name)
    }

    pub fn crew_root(&self) -> PathBuf {
        self.path.join(CREW_DIR)
    }

    pub fn crew_dir(&self, name: &str) -> PathBuf {
        self.crew_root().join(name)
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.path.join(RUNTIME_DIR)
    }
}

/// Sorted names of the non-hidden subdirectories of `dir`; empty if `dir`
/// does not exist.
pub(crate) fn list_subdirs(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(Error::io("listing", dir))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(Error::io("listing", dir))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let rig = Rig::new("gastown", Path::new("/town/gastown"));
        assert_eq!(rig.polecat_dir("joe"), PathBuf::from("/town/gastown/polecats/joe"));
        assert_eq!(rig.crew_dir("dave"), PathBuf::from("/town/gastown/crew/dave"));
        assert_eq!(rig.runtime_dir(), PathBuf::from("/town/gastown/.runtime"));
    }

    #[test]
    fn discover_reads_polecats_and_git_url() {
        let town = tempfile::tempdir().unwrap();
        let root = town.path().join("gastown");
        fs::create_dir_all(root.join("polecats/toast")).unwrap();
        fs::create_dir_all(root.join("polecats/joe")).unwrap();
        fs::create_dir_all(root.join("polecats/.trash")).unwrap();
        fs::write(root.join("polecats/README"), "not a polecat").unwrap();
        fs::write(
            root.join(RIG_CONFIG_FILE),
            r#"{"git_url": "https://example.com/gastown.git", "extra": 1}"#,
        )
        .unwrap();

        let rig = Rig::discover(town.path(), "gastown").unwrap();
        assert_eq!(rig.name, "gastown");
        assert_eq!(rig.polecats, vec!["joe", "toast"]);
        assert_eq!(rig.git_url.as_deref(), Some("https://example.com/gastown.git"));
    }

    #[test]
    fn discover_without_config_or_polecats() {
        let town = tempfile::tempdir().unwrap();
        fs::create_dir_all(town.path().join("empty")).unwrap();
        let rig = Rig::discover(town.path(), "empty").unwrap();
        assert!(rig.git_url.is_none());
        assert!(rig.polecats.is_empty());
    }

    #[test]
    fn discover_missing_rig() {
        let town = tempfile::tempdir().unwrap();
        let err = Rig::discover(town.path(), "ghost").unwrap_err();
        assert!(matches!(err, Error::RigNotFound(_)));
    }

    #[test]
    fn discover_malformed_config() {
        let town = tempfile::tempdir().unwrap();
        let root = town.path().join("bad");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(RIG_CONFIG_FILE), "{").unwrap();
        assert!(matches!(
            Rig::discover(town.path(), "bad"),
            Err(Error::Config { .. })
        ));
    }
}
