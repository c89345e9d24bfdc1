//! Artifact types: what the cache produces and how it is labelled.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The representation a source document is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// HTML document or embeddable fragment.
    RenderedHtml,
    /// Typeset PDF.
    RenderedPdf,
    /// Downscaled JPEG photograph.
    ScaledJpeg,
}

impl TargetKind {
    pub const ALL: [TargetKind; 3] = [
        TargetKind::RenderedHtml,
        TargetKind::RenderedPdf,
        TargetKind::ScaledJpeg,
    ];

    /// Content type the serving layer sends with the artifact bytes.
    pub fn content_type(self) -> &'static str {
        match self {
            TargetKind::RenderedHtml => "text/html; charset=utf-8",
            TargetKind::RenderedPdf => "application/pdf",
            TargetKind::ScaledJpeg => "image/jpeg",
        }
    }

    /// File extension of the cached artifact, including the dot.
    pub fn extension(self) -> &'static str {
        match self {
            TargetKind::RenderedHtml => ".html",
            TargetKind::RenderedPdf => ".pdf",
            TargetKind::ScaledJpeg => ".jpg",
        }
    }

    /// Subtree of the cache root holding artifacts of this kind.
    pub fn dir_name(self) -> &'static str {
        match self {
            TargetKind::RenderedHtml => "html",
            TargetKind::RenderedPdf => "pdf",
            TargetKind::ScaledJpeg => "jpeg",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "rendered_html" => Ok(TargetKind::RenderedHtml),
            "pdf" | "rendered_pdf" => Ok(TargetKind::RenderedPdf),
            "jpeg" | "jpg" | "scaled_jpeg" => Ok(TargetKind::ScaledJpeg),
            other => Err(format!("unknown target kind '{other}' (expected html, pdf or jpeg)")),
        }
    }
}

/// Where the bytes of an [`Artifact`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOrigin {
    /// Fresh cache entry read from disk.
    CacheHit,
    /// Freshly converted and published to the cache.
    Built,
    /// Freshly converted, but the publish failed; nothing new on disk.
    BuiltUncached,
}

/// A derived rendition returned by [`crate::cache::ArtifactCache::get_or_build`].
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: String,
    pub kind: TargetKind,
    pub bytes: Vec<u8>,
    pub origin: ArtifactOrigin,
}

impl Artifact {
    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// The unconverted source bytes, served as-is.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_match_serving_contract() {
        assert_eq!(
            TargetKind::RenderedHtml.content_type(),
            "text/html; charset=utf-8"
        );
        assert_eq!(TargetKind::RenderedPdf.content_type(), "application/pdf");
        assert_eq!(TargetKind::ScaledJpeg.content_type(), "image/jpeg");
    }

    #[test]
    fn every_kind_has_its_own_subtree() {
        let mut dirs: Vec<_> = TargetKind::ALL.iter().map(|k| k.dir_name()).collect();
        dirs.dedup();
        assert_eq!(dirs.len(), 3);
    }

    #[test]
    fn parse_kind_aliases() {
        assert_eq!("HTML".parse::<TargetKind>(), Ok(TargetKind::RenderedHtml));
        assert_eq!("jpg".parse::<TargetKind>(), Ok(TargetKind::ScaledJpeg));
        assert_eq!("pdf".parse::<TargetKind>(), Ok(TargetKind::RenderedPdf));
        assert!("docx".parse::<TargetKind>().is_err());
    }
}
