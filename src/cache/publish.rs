//! Atomic publish: write to a uniquely named sibling, then rename into place.
//!
//! Readers either see the previous artifact or the complete new one, never a
//! partial write. Each attempt draws a random suffix so concurrent builders of
//! the same (id, kind) never share a temporary file; the last rename wins.
//!
//! The write and rename run together on the blocking pool. A blocking task
//! runs to completion even when the awaiting future is dropped, so a caller
//! that gives up mid-publish still leaves either the renamed artifact or no
//! file at all.

use super::layout::temp_path;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Random suffix for one publish attempt.
fn random_suffix() -> io::Result<u64> {
    let mut bytes = [0u8; 8];
    getrandom::fill(&mut bytes).map_err(|e| io::Error::other(format!("random suffix: {e}")))?;
    Ok(u64::from_le_bytes(bytes))
}

/// Removes the temporary file on drop unless it was renamed away.
struct TempFile {
    path: PathBuf,
    renamed: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            renamed: false,
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.renamed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not remove {}: {}", self.path.display(), e);
            }
        }
    }
}

fn write_and_rename(tmp: PathBuf, final_path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = TempFile::new(tmp);
    std::fs::write(&tmp.path, bytes)?;
    std::fs::rename(&tmp.path, final_path)?;
    tmp.renamed = true;
    Ok(())
}

/// Publish `bytes` at `final_path`.
///
/// On any failure the temporary file is removed and the error returned; the
/// previous artifact (if any) is left untouched.
pub async fn publish_atomic(final_path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = final_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(final_path, random_suffix()?);
    let target = final_path.to_path_buf();
    let payload = bytes.to_vec();
    tokio::task::spawn_blocking(move || write_and_rename(tmp, &target, &payload))
        .await
        .map_err(|e| io::Error::other(format!("publish task: {e}")))??;

    debug!("Published {} ({} bytes)", final_path.display(), bytes.len());
    Ok(())
}
