//! End-to-end tests against the real external converters.
//!
//! Gated behind the `E2E_ENABLED` environment variable; each test also skips
//! when the converter it needs is not installed.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use rendition_cache::{
    ArtifactCache, ArtifactOrigin, FsDocumentStore, RenditionConfig, RenditionError, TargetKind,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip unless E2E_ENABLED is set and `$tool` can be started.
macro_rules! e2e_skip_unless_tool {
    ($tool:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let available = std::process::Command::new($tool)
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok();
        if !available {
            println!("SKIP — {} not installed", $tool);
            return;
        }
    }};
}

const RTF: &str = r"{\rtf1\ansi\deff0 {\fonttbl {\f0 Times;}}\f0 Motie van het lid Jansen\par Aangenomen.\par}";

const TRANSCRIPT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<verslag>
  <spreker>De voorzitter</spreker>
  <tekst>Ik open de vergadering.</tekst>
</verslag>
"#;

const STYLESHEET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:output method="xml" encoding="UTF-8"/>
  <xsl:template match="/verslag">
    <div class="verslag">
      <b><xsl:value-of select="spreker"/></b>
      <p><xsl:value-of select="tekst"/></p>
    </div>
  </xsl:template>
</xsl:stylesheet>
"#;

fn cache_for(dir: &Path, config: rendition_cache::RenditionConfigBuilder) -> ArtifactCache {
    let config = config
        .cache_dir(dir.join("doccache"))
        .build()
        .expect("valid config");
    ArtifactCache::new(config, Arc::new(FsDocumentStore::new(dir.join("docstore"))))
}

fn add_source(dir: &Path, id: &str, bytes: &[u8]) {
    let store = dir.join("docstore");
    std::fs::create_dir_all(&store).unwrap();
    std::fs::write(store.join(id), bytes).unwrap();
}

// ── pandoc ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rich_text_to_html() {
    e2e_skip_unless_tool!("pandoc");
    let dir = TempDir::new().unwrap();
    add_source(dir.path(), "motie-1", RTF.as_bytes());
    let cache = cache_for(dir.path(), RenditionConfig::builder());

    let artifact = cache
        .get_or_build("motie-1", TargetKind::RenderedHtml)
        .await
        .expect("pandoc renders rtf");
    let html = String::from_utf8_lossy(&artifact.bytes);
    assert!(html.contains("Motie van het lid Jansen"), "got: {html}");
    assert!(html.contains("72em"), "max width is passed through");

    let again = cache
        .get_or_build("motie-1", TargetKind::RenderedHtml)
        .await
        .unwrap();
    assert_eq!(again.origin, ArtifactOrigin::CacheHit);
    println!("✓ rtf → html, {} bytes", artifact.bytes.len());
}

// ── xmlstarlet ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_transcript_to_fragment() {
    e2e_skip_unless_tool!("xmlstarlet");
    let dir = TempDir::new().unwrap();
    add_source(dir.path(), "verslag-1", TRANSCRIPT.as_bytes());
    let xslt = dir.path().join("tk-div.xslt");
    std::fs::write(&xslt, STYLESHEET).unwrap();
    let cache = cache_for(
        dir.path(),
        RenditionConfig::builder().transcript_stylesheet(&xslt),
    );

    let artifact = cache
        .get_or_build("verslag-1", TargetKind::RenderedHtml)
        .await
        .expect("xmlstarlet applies the stylesheet");
    let html = String::from_utf8_lossy(&artifact.bytes);
    assert!(!html.trim_start().starts_with("<?xml"), "got: {html}");
    assert!(html.contains("De voorzitter"));
    println!("✓ transcript → fragment: {}", html.trim());
}

// ── No tool needed ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pdf_passthrough_is_byte_identical() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }
    let dir = TempDir::new().unwrap();
    let pdf = b"%PDF-1.4\n1 0 obj <<>> endobj\ntrailer <<>>\n%%EOF\n";
    add_source(dir.path(), "doc-pdf", pdf);
    let cache = cache_for(dir.path(), RenditionConfig::builder());

    let artifact = cache
        .get_or_build("doc-pdf", TargetKind::RenderedPdf)
        .await
        .unwrap();
    assert_eq!(artifact.bytes, pdf);
}

#[tokio::test]
async fn test_missing_converter_is_reported() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }
    let dir = TempDir::new().unwrap();
    add_source(dir.path(), "motie-1", RTF.as_bytes());
    let cache = cache_for(
        dir.path(),
        RenditionConfig::builder().pandoc_program("pandoc-not-installed-here"),
    );

    let err = cache
        .get_or_build("motie-1", TargetKind::RenderedHtml)
        .await
        .unwrap_err();
    assert!(matches!(err, RenditionError::Conversion(_)), "got: {err}");
    assert!(!dir.path().join("doccache/html/motie-1.html").exists());
}
