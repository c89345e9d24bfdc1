//! Format classification: decide which conversion applies to a source file.
//!
//! Source files are stored under their bare id, so the extension is usually
//! absent. Magic bytes are therefore checked first and the extension is only
//! a fallback. Classification never fails: anything unrecognised is treated
//! as PDF-like and the pipeline reports the failure if it really is not.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Number of leading bytes inspected.
const HEAD_LEN: usize = 64;

const OLE2_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Detected format of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceFormat {
    /// Office Open XML word-processor package (`.docx`).
    WordProcessor,
    /// Rich Text Format.
    RichText,
    /// Legacy binary word document (OLE2 compound file, `.doc`).
    LegacyWord,
    /// Structured XML, e.g. a meeting transcript.
    TranscriptXml,
    /// PDF; also the default for anything unrecognised.
    Pdf,
    /// Raster photograph.
    Photo,
}

impl SourceFormat {
    pub fn name(self) -> &'static str {
        match self {
            SourceFormat::WordProcessor => "word-processor",
            SourceFormat::RichText => "rich-text",
            SourceFormat::LegacyWord => "legacy-word",
            SourceFormat::TranscriptXml => "transcript-xml",
            SourceFormat::Pdf => "pdf",
            SourceFormat::Photo => "photo",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of inspecting a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Detected {
    pub format: SourceFormat,
    /// MIME type implied by the detection.
    pub content_type: &'static str,
}

/// Classify the file at `path`.
pub async fn classify(path: &Path) -> SourceFormat {
    detect(path).await.format
}

/// Inspect the head of the file at `path` and its extension.
///
/// An unreadable file is classified from its extension alone.
pub async fn detect(path: &Path) -> Detected {
    let head = read_head(path).await.unwrap_or_default();
    let ext = path.extension().and_then(|e| e.to_str());
    let detected = detect_head(&head, ext);
    debug!(
        "Classified {} as {} ({})",
        path.display(),
        detected.format,
        detected.content_type
    );
    detected
}

async fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(HEAD_LEN);
    file.take(HEAD_LEN as u64).read_to_end(&mut head).await?;
    Ok(head)
}

/// Classify from leading bytes, falling back to the extension.
pub fn detect_head(head: &[u8], ext: Option<&str>) -> Detected {
    if let Some(d) = from_magic(head) {
        return d;
    }
    if let Some(d) = ext.and_then(from_extension) {
        return d;
    }
    detected(SourceFormat::Pdf)
}

fn from_magic(head: &[u8]) -> Option<Detected> {
    if head.starts_with(b"PK\x03\x04") {
        return Some(detected(SourceFormat::WordProcessor));
    }
    if head.starts_with(b"{\\rtf") {
        return Some(detected(SourceFormat::RichText));
    }
    if head.starts_with(&OLE2_MAGIC) {
        return Some(detected(SourceFormat::LegacyWord));
    }
    if head.starts_with(b"%PDF") {
        return Some(detected(SourceFormat::Pdf));
    }
    if looks_like_xml(head) {
        return Some(detected(SourceFormat::TranscriptXml));
    }
    if let Ok(fmt) = image::guess_format(head) {
        return Some(Detected {
            format: SourceFormat::Photo,
            content_type: fmt.to_mime_type(),
        });
    }
    None
}

fn looks_like_xml(head: &[u8]) -> bool {
    let body = head.strip_prefix(&UTF8_BOM[..]).unwrap_or(head);
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    let body = &body[start..];

    if body.starts_with(b"<?xml") {
        return true;
    }
    // A bare root element, but not an HTML page.
    if body.first() == Some(&b'<') {
        let lower: Vec<u8> = body.iter().take(14).map(u8::to_ascii_lowercase).collect();
        let is_html = lower.starts_with(b"<!doctype html") || lower.starts_with(b"<html");
        let is_element = body.get(1).is_some_and(|b| b.is_ascii_alphabetic());
        return is_element && !is_html;
    }
    false
}

fn from_extension(ext: &str) -> Option<Detected> {
    let format = match ext.to_ascii_lowercase().as_str() {
        "docx" => SourceFormat::WordProcessor,
        "rtf" => SourceFormat::RichText,
        "doc" => SourceFormat::LegacyWord,
        "xml" => SourceFormat::TranscriptXml,
        "pdf" => SourceFormat::Pdf,
        other => {
            let fmt = image::ImageFormat::from_extension(other)?;
            return Some(Detected {
                format: SourceFormat::Photo,
                content_type: fmt.to_mime_type(),
            });
        }
    };
    Some(detected(format))
}

fn detected(format: SourceFormat) -> Detected {
    let content_type = match format {
        SourceFormat::WordProcessor => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        SourceFormat::RichText => "application/rtf",
        SourceFormat::LegacyWord => "application/msword",
        SourceFormat::TranscriptXml => "application/xml",
        SourceFormat::Pdf => "application/pdf",
        SourceFormat::Photo => "application/octet-stream",
    };
    Detected {
        format,
        content_type,
    }
}
