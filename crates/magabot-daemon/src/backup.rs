//! Shutdown backups.
//!
//! The data directory is archived as a gzipped tarball on shutdown and
//! the backup directory is pruned to a configured keep-count. With a
//! vault attached, archives are encrypted at rest (`.tar.gz.enc`); the
//! key file beside the config decrypts them.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use magabot_crypto::Vault;
use tracing::{info, warn};

use crate::error::DaemonResult;

/// Creates and prunes archives of the data directory.
pub struct BackupManager {
    data_dir: PathBuf,
    backups_dir: PathBuf,
    keep: usize,
    vault: Option<Arc<Vault>>,
}

impl BackupManager {
    /// Create a manager archiving `data_dir` into `backups_dir`.
    pub fn new(data_dir: PathBuf, backups_dir: PathBuf, keep: usize) -> Self {
        Self {
            data_dir,
            backups_dir,
            keep: keep.max(1),
            vault: None,
        }
    }

    /// Encrypt archives with `vault` before they land on disk.
    #[must_use]
    pub fn with_vault(mut self, vault: Arc<Vault>) -> Self {
        self.vault = Some(vault);
        self
    }

    /// Archive the data directory; returns the new archive's path.
    pub fn create(&self) -> DaemonResult<PathBuf> {
        std::fs::create_dir_all(&self.backups_dir)?;
        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");

        let mut tarball = Vec::new();
        {
            let encoder = GzEncoder::new(&mut tarball, Compression::default());
            let mut archive = tar::Builder::new(encoder);
            if self.data_dir.exists() {
                archive.append_dir_all("data", &self.data_dir)?;
            }
            archive.into_inner()?.finish()?;
        }

        let path = match &self.vault {
            Some(vault) => {
                let path = self.backups_dir.join(format!("magabot-{stamp}.tar.gz.enc"));
                let sealed = vault.encrypt(&tarball).map_err(|e| {
                    std::io::Error::other(format!("backup encryption failed: {e}"))
                })?;
                std::fs::write(&path, sealed)?;
                path
            },
            None => {
                let path = self.backups_dir.join(format!("magabot-{stamp}.tar.gz"));
                std::fs::write(&path, &tarball)?;
                path
            },
        };

        info!(path = %path.display(), "created shutdown backup");
        self.prune();
        Ok(path)
    }

    /// Delete the oldest archives beyond the keep-count.
    fn prune(&self) {
        let mut backups = self.list();
        while backups.len() > self.keep {
            let oldest = backups.remove(0);
            if let Err(e) = std::fs::remove_file(&oldest) {
                warn!(path = %oldest.display(), error = %e, "failed to prune backup");
            }
        }
    }

    /// Paths of existing archives, oldest first.
    pub fn list(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.backups_dir) else {
            return Vec::new();
        };
        let mut backups: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| {
                        n.starts_with("magabot-")
                            && (n.ends_with(".tar.gz") || n.ends_with(".tar.gz.enc"))
                    })
            })
            .collect();
        // Timestamped names sort chronologically.
        backups.sort();
        backups
    }
}

/// Archive the data dir once, honouring the keep-count (convenience for
/// the shutdown path).
pub fn shutdown_backup(
    data_dir: &Path,
    backups_dir: &Path,
    keep: usize,
    vault: Option<Arc<Vault>>,
) -> DaemonResult<PathBuf> {
    let mut manager =
        BackupManager::new(data_dir.to_path_buf(), backups_dir.to_path_buf(), keep);
    if let Some(vault) = vault {
        manager = manager.with_vault(vault);
    }
    manager.create()
}
