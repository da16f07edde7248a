//! The user-scoped filesystem layout.
//!
//! Everything magabot persists lives under one root (default
//! `~/.magabot`). Paths are computed once at startup and passed explicitly;
//! no module re-derives them.

use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::{CoreError, CoreResult};

/// Resolved locations of magabot's on-disk state.
#[derive(Debug, Clone)]
pub struct MagabotDirs {
    /// Root directory (default `~/.magabot`).
    pub root: PathBuf,
    /// Main YAML config file, 0600.
    pub config_file: PathBuf,
    /// Local secrets backend file, 0600.
    pub secrets_file: PathBuf,
    /// Vault key file, 0600.
    pub vault_key_file: PathBuf,
    /// Sqlite message archive and other durable data.
    pub data_dir: PathBuf,
    /// Adapter media downloads.
    pub downloads_dir: PathBuf,
    /// Shutdown backups.
    pub backups_dir: PathBuf,
    /// Security audit log.
    pub audit_log: PathBuf,
}

impl MagabotDirs {
    /// Resolve the layout under the user's home directory.
    pub fn resolve() -> CoreResult<Self> {
        let base = BaseDirs::new().ok_or(CoreError::NoHomeDirectory)?;
        Ok(Self::with_root(base.home_dir().join(".magabot")))
    }

    /// Build the layout under an explicit root (tests, `--home` override).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_file: root.join("config.yaml"),
            secrets_file: root.join("secrets.json"),
            vault_key_file: root.join("vault.key"),
            data_dir: root.join("data"),
            downloads_dir: root.join("downloads"),
            backups_dir: root.join("backups"),
            audit_log: root.join("audit.log"),
            root,
        }
    }

    /// Directories that must exist before subsystems start.
    pub fn required_dirs(&self) -> [&Path; 4] {
        [
            &self.root,
            &self.data_dir,
            &self.downloads_dir,
            &self.backups_dir,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_hangs_off_root() {
        let dirs = MagabotDirs::with_root("/tmp/mb");
        assert_eq!(dirs.config_file, Path::new("/tmp/mb/config.yaml"));
        assert_eq!(dirs.downloads_dir, Path::new("/tmp/mb/downloads"));
        assert_eq!(dirs.audit_log, Path::new("/tmp/mb/audit.log"));
        assert_eq!(dirs.required_dirs().len(), 4);
    }
}
