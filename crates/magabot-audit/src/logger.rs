//! The rotating NDJSON writer.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::warn;

use crate::error::AuditResult;
use crate::event::SecurityEvent;

struct WriterState {
    file: File,
    size: u64,
}

/// Append-only security event log with size-bounded rotation.
///
/// One mutex covers both writes and rotation, so a record can never land in
/// a closed handle.
pub struct AuditLogger {
    path: PathBuf,
    max_size: u64,
    state: Mutex<WriterState>,
}

impl AuditLogger {
    /// Open (or create) the log at `path`, rotating at `max_size_mb`.
    pub fn open(path: impl Into<PathBuf>, max_size_mb: u64) -> AuditResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            max_size: max_size_mb.max(1) * 1024 * 1024,
            state: Mutex::new(WriterState { file, size }),
        })
    }

    /// Append one event.
    pub fn log(&self, event: &SecurityEvent) -> AuditResult<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if guard.size >= self.max_size {
            self.rotate(&mut guard)?;
        }

        guard.file.write_all(&line)?;
        guard.size += line.len() as u64;
        Ok(())
    }

    /// Append one event, logging instead of propagating on failure.
    ///
    /// The hot path must never fail because the audit disk is full.
    pub fn log_best_effort(&self, event: &SecurityEvent) {
        if let Err(e) = self.log(event) {
            warn!(error = %e, "failed to write audit event");
        }
    }

    /// Flush buffered data to disk.
    pub fn flush(&self) -> AuditResult<()> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .file
            .flush()?;
        Ok(())
    }

    /// Path of the live log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename the full log aside, open a fresh file, then release the old
    /// handle — in that order. If the fresh file cannot be opened, the
    /// rename is undone and the old handle stays live.
    fn rotate(&self, state: &mut WriterState) -> AuditResult<()> {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let rotated = PathBuf::from(format!("{}.{stamp}", self.path.display()));

        state.file.flush()?;
        std::fs::rename(&self.path, &rotated)?;

        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(fresh) => {
                let old = std::mem::replace(&mut state.file, fresh);
                state.size = 0;
                drop(old);
                Ok(())
            },
            Err(e) => {
                if let Err(undo) = std::fs::rename(&rotated, &self.path) {
                    warn!(error = %undo, "failed to roll back audit rotation");
                }
                Err(e.into())
            },
        }
    }
}
