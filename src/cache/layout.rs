//! On-disk layout of the artifact cache.
//!
//! ```text
//! <cache_root>/
//!   html/<id>.html
//!   pdf/<id>.pdf
//!   jpeg/<id>.jpg
//! ```
//!
//! Paths are a pure function of (id, kind). Temporary files for the atomic
//! publish live next to their final path so the rename never crosses a
//! filesystem boundary.

use crate::artifact::TargetKind;
use crate::error::RenditionError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// True when `id` can safely name a single file inside a directory.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && !id.contains(['/', '\\', '\0'])
        && !id.contains("..")
}

#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical cache path for (id, kind). Rejects ids that are not plain names.
    pub fn artifact_path(&self, id: &str, kind: TargetKind) -> Result<PathBuf, RenditionError> {
        if !is_valid_id(id) {
            return Err(RenditionError::InvalidId { id: id.to_string() });
        }
        Ok(self
            .root
            .join(kind.dir_name())
            .join(format!("{id}{}", kind.extension())))
    }
}

/// Sibling of `final_path` carrying a unique numeric suffix.
pub fn temp_path(final_path: &Path, suffix: u64) -> PathBuf {
    let mut name: OsString = final_path.as_os_str().to_owned();
    name.push(format!(".{suffix}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_per_kind() {
        let layout = CacheLayout::new("/var/cache/r");
        assert_eq!(
            layout.artifact_path("doc-42", TargetKind::RenderedHtml).unwrap(),
            PathBuf::from("/var/cache/r/html/doc-42.html")
        );
        assert_eq!(
            layout.artifact_path("doc-42", TargetKind::RenderedPdf).unwrap(),
            PathBuf::from("/var/cache/r/pdf/doc-42.pdf")
        );
        assert_eq!(
            layout.artifact_path("p7", TargetKind::ScaledJpeg).unwrap(),
            PathBuf::from("/var/cache/r/jpeg/p7.jpg")
        );
    }

    #[test]
    fn unsafe_ids_rejected() {
        let layout = CacheLayout::new("c");
        for id in ["", "../x", "a/b", "a\\b", ".hidden", "a\0b", "x..y"] {
            let err = layout
                .artifact_path(id, TargetKind::RenderedHtml)
                .unwrap_err();
            assert!(matches!(err, RenditionError::InvalidId { .. }), "{id:?}");
        }
    }

    #[test]
    fn ordinary_ids_accepted() {
        for id in ["doc-42", "2024D12345", "a.b", "foto_persoon"] {
            assert!(is_valid_id(id), "{id}");
        }
    }

    #[test]
    fn temp_path_is_sibling() {
        let final_path = Path::new("/c/html/doc.html");
        let tmp = temp_path(final_path, 12345);
        assert_eq!(tmp, PathBuf::from("/c/html/doc.html.12345"));
        assert_eq!(tmp.parent(), final_path.parent());
    }
}
