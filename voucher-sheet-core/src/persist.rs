//! Writing finished artifacts to a local directory.
//!
//! Filenames may come from a remote server, so they are reduced to a single safe path
//! component before use. Existing files are never overwritten: a ` (n)` suffix is
//! added instead. Bytes go through a temporary file in the target directory and are
//! persisted under the final name in one step.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::error::PersistError;

const DEFAULT_NAME: &str = "download";

/// Reduces `name` to one path component without separators, control characters or
/// leading dots.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.').trim();
    if trimmed.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// First path in `dir` for `filename` that does not exist yet.
fn available_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };
    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Saves `bytes` into `dir` and returns the path written.
pub fn save_artifact(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf, PersistError> {
    let io_err = |path: &Path, source: std::io::Error| {
        error!(error = ?source, path = %path.display(), "Failed to save artifact");
        PersistError::Io {
            path: path.display().to_string(),
            source,
        }
    };

    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        debug!(path = %dir.display(), "Created output directory");
    }

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_err(dir, e))?;
    tmp.write_all(bytes).map_err(|e| io_err(tmp.path(), e))?;
    tmp.flush().map_err(|e| io_err(tmp.path(), e))?;

    let target = available_path(dir, &sanitize_filename(filename));
    tmp.persist_noclobber(&target)
        .map_err(|e| io_err(&target, e.error))?;

    info!(path = %target.display(), size = bytes.len(), "Artifact saved");
    Ok(target)
}
