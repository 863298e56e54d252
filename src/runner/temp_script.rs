//! Materialized script files.
//!
//! Each run writes its script to `{base}_{random}.js` in the configured
//! temp directory. The file is removed when the [`TempScript`] is closed
//! or dropped.

use std::io;
use std::path::Path;

use tempfile::TempPath;
use tracing::debug;

/// Base name used when the hint yields nothing usable.
pub const FALLBACK_BASE_NAME: &str = "k6-script";

/// Extension of every materialized script.
pub const SCRIPT_EXTENSION: &str = ".js";

const RANDOM_SUFFIX_LEN: usize = 12;

/// Derive a file-system safe base name from an optional hint.
///
/// Directories and the extension are stripped, then every character
/// outside `[A-Za-z0-9_-]` is discarded.
pub fn sanitize_base_name(hint: Option<&str>) -> String {
    let stem = hint
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .and_then(|h| Path::new(h).file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let base: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();

    if base.is_empty() {
        FALLBACK_BASE_NAME.to_string()
    } else {
        base
    }
}

/// A script written to disk for the lifetime of one run.
#[derive(Debug)]
pub struct TempScript {
    path: TempPath,
}

impl TempScript {
    /// Write `script` as UTF-8 to a fresh file in `dir`.
    pub async fn materialize(dir: &Path, hint: Option<&str>, script: &str) -> io::Result<Self> {
        let base = sanitize_base_name(hint);
        let path = tempfile::Builder::new()
            .prefix(&format!("{base}_"))
            .suffix(SCRIPT_EXTENSION)
            .rand_bytes(RANDOM_SUFFIX_LEN)
            .tempfile_in(dir)?
            .into_temp_path();

        // Dropping `path` on a failed write removes the empty file.
        tokio::fs::write(&path, script).await?;

        debug!(path = %path.display(), bytes = script.len(), "Materialized script");
        Ok(Self { path })
    }

    /// Location of the script on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now. Failures are logged, never returned.
    pub fn close(self) {
        let location = self.path.display().to_string();
        if let Err(e) = self.path.close() {
            debug!(path = %location, error = %e, "Failed to delete temp script");
        }
    }
}
