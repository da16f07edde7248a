//! Media download constraints.
//!
//! Every adapter that downloads files applies the same rules: a 20 MiB
//! size cap, an extension allow-list with unknown extensions rewritten to
//! `.bin`, files created 0600 inside the configured downloads directory,
//! and a path check before any downstream consumer reads a file back.

use std::path::{Component, Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// Maximum size of a single media download, in bytes.
pub const MAX_MEDIA_BYTES: u64 = 20 * 1024 * 1024;

/// File extensions an adapter may keep as-is.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "webp", "bmp", // video
    "mp4", "webm", "mov", // audio
    "ogg", "oga", "mp3", "m4a", "wav", // documents
    "pdf", "txt",
];

/// Whether `size` fits under the download cap.
pub fn check_size(size: u64) -> CoreResult<()> {
    if size > MAX_MEDIA_BYTES {
        return Err(CoreError::MediaTooLarge {
            actual: size,
            limit: MAX_MEDIA_BYTES,
        });
    }
    Ok(())
}

/// Sanitize a file name for storage.
///
/// Strips any directory components, then rewrites the extension to `.bin`
/// unless it appears on the allow-list (case-insensitive).
pub fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned());

    let allowed = Path::new(&base)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            let lower = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&lower.as_str())
        });

    if allowed {
        base
    } else {
        let stem = Path::new(&base)
            .file_stem()
            .map_or_else(|| "file".to_string(), |s| s.to_string_lossy().into_owned());
        format!("{stem}.bin")
    }
}

/// Verify that `candidate` resolves inside `downloads_dir`.
///
/// Lexically normalizes the path (rejecting `..` traversal) and requires it
/// to sit strictly under the downloads directory. Returns the normalized
/// path on success. Consumers call this before reading any adapter-produced
/// media path.
pub fn safe_media_path(downloads_dir: &Path, candidate: &Path) -> CoreResult<PathBuf> {
    let escape = || CoreError::MediaPathEscape {
        path: candidate.to_path_buf(),
    };

    let full = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        downloads_dir.join(candidate)
    };

    let mut normalized = PathBuf::new();
    for comp in full.components() {
        match comp {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(escape());
                }
            },
            Component::CurDir => {},
            other => normalized.push(other),
        }
    }

    // Prefix check with a separator boundary: `/downloads-evil` must not
    // pass for a downloads dir of `/downloads`.
    if normalized == downloads_dir || !normalized.starts_with(downloads_dir) {
        return Err(escape());
    }

    Ok(normalized)
}
