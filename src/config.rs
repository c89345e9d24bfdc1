//! Configuration types for the artifact cache and its conversion pipeline.
//!
//! All behaviour is controlled through [`RenditionConfig`], built via its
//! [`RenditionConfigBuilder`]. One struct holds every knob so a config can be
//! shared across request workers, logged, and diffed between deployments.

use crate::error::RenditionError;
use crate::progress::CacheObserver;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for an [`crate::cache::ArtifactCache`] and the external
/// conversion pipeline it drives.
///
/// # Example
/// ```rust
/// use rendition_cache::RenditionConfig;
///
/// let config = RenditionConfig::builder()
///     .cache_dir("/var/cache/renditions")
///     .conversion_timeout_secs(30)
///     .photo_max_dimension(400)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct RenditionConfig {
    /// Root of the artifact cache. One subtree per target kind lives below it.
    /// Default: `doccache`.
    pub cache_dir: PathBuf,

    /// Upper bound on a single external converter run, in seconds. Default: 60.
    ///
    /// On expiry the child process is killed and the call fails with
    /// [`crate::error::ConversionError::Timeout`]; nothing is published.
    pub conversion_timeout_secs: u64,

    /// Maximum content width handed to pandoc for HTML output. Default: `72em`.
    pub max_content_width: String,

    /// Left and right page margin for typeset PDF output. Default: `1cm`.
    pub pdf_margin: String,

    /// LaTeX font family package for typeset PDF output. Default: `dejavu`.
    pub pdf_font_family: String,

    /// Main (serif) font for typeset PDF output. Default: `DejaVu Serif`.
    pub pdf_main_font: String,

    /// Sans font for typeset PDF output. Default: `Arial`.
    pub pdf_sans_font: String,

    /// PDF engine pandoc typesets with. Default: `xelatex`.
    pub pdf_engine: String,

    /// XSLT stylesheet turning transcript XML into an HTML fragment.
    /// Default: `tk-div.xslt`.
    pub transcript_stylesheet: PathBuf,

    /// Program used for word-processor and rich-text conversion. Default: `pandoc`.
    pub pandoc_program: String,

    /// Program used for legacy binary word text extraction. Default: `catdoc`.
    pub catdoc_program: String,

    /// Program used to apply the transcript stylesheet. Default: `xmlstarlet`.
    pub xmlstarlet_program: String,

    /// Program used for PDF → HTML reconstruction. Default: `pdftohtml`.
    pub pdftohtml_program: String,

    /// Longest edge of a scaled photograph, in pixels. Range: 16–4096. Default: 400.
    pub photo_max_dimension: u32,

    /// JPEG quality for scaled photographs. Range: 1–100. Default: 85.
    pub jpeg_quality: u8,

    /// Pin converter timestamps to the source modification time by passing
    /// `SOURCE_DATE_EPOCH` to external tools. Default: true.
    ///
    /// Without it typeset PDFs embed the build time, so two builds of the
    /// same source differ byte-for-byte.
    pub reproducible_builds: bool,

    /// Let concurrent misses on the same (id, kind) wait for one build
    /// instead of each running the pipeline. Default: false.
    ///
    /// With `false`, simultaneous misses all convert and the last rename wins.
    pub coalesce_builds: bool,

    /// Optional observer notified of hits, builds and publish failures.
    pub observer: Option<Arc<dyn CacheObserver>>,
}

impl Default for RenditionConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("doccache"),
            conversion_timeout_secs: 60,
            max_content_width: "72em".to_string(),
            pdf_margin: "1cm".to_string(),
            pdf_font_family: "dejavu".to_string(),
            pdf_main_font: "DejaVu Serif".to_string(),
            pdf_sans_font: "Arial".to_string(),
            pdf_engine: "xelatex".to_string(),
            transcript_stylesheet: PathBuf::from("tk-div.xslt"),
            pandoc_program: "pandoc".to_string(),
            catdoc_program: "catdoc".to_string(),
            xmlstarlet_program: "xmlstarlet".to_string(),
            pdftohtml_program: "pdftohtml".to_string(),
            photo_max_dimension: 400,
            jpeg_quality: 85,
            reproducible_builds: true,
            coalesce_builds: false,
            observer: None,
        }
    }
}

impl fmt::Debug for RenditionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenditionConfig")
            .field("cache_dir", &self.cache_dir)
            .field("conversion_timeout_secs", &self.conversion_timeout_secs)
            .field("max_content_width", &self.max_content_width)
            .field("pdf_engine", &self.pdf_engine)
            .field("transcript_stylesheet", &self.transcript_stylesheet)
            .field("photo_max_dimension", &self.photo_max_dimension)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("reproducible_builds", &self.reproducible_builds)
            .field("coalesce_builds", &self.coalesce_builds)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn CacheObserver>"))
            .finish()
    }
}

impl RenditionConfig {
    /// Create a new builder for `RenditionConfig`.
    pub fn builder() -> RenditionConfigBuilder {
        RenditionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RenditionConfig`].
#[derive(Debug)]
pub struct RenditionConfigBuilder {
    config: RenditionConfig,
}

impl RenditionConfigBuilder {
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = dir.into();
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = secs;
        self
    }

    pub fn max_content_width(mut self, width: impl Into<String>) -> Self {
        self.config.max_content_width = width.into();
        self
    }

    pub fn pdf_margin(mut self, margin: impl Into<String>) -> Self {
        self.config.pdf_margin = margin.into();
        self
    }

    pub fn pdf_fonts(
        mut self,
        family: impl Into<String>,
        main: impl Into<String>,
        sans: impl Into<String>,
    ) -> Self {
        self.config.pdf_font_family = family.into();
        self.config.pdf_main_font = main.into();
        self.config.pdf_sans_font = sans.into();
        self
    }

    pub fn pdf_engine(mut self, engine: impl Into<String>) -> Self {
        self.config.pdf_engine = engine.into();
        self
    }

    pub fn transcript_stylesheet(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.transcript_stylesheet = path.into();
        self
    }

    pub fn pandoc_program(mut self, program: impl Into<String>) -> Self {
        self.config.pandoc_program = program.into();
        self
    }

    pub fn catdoc_program(mut self, program: impl Into<String>) -> Self {
        self.config.catdoc_program = program.into();
        self
    }

    pub fn xmlstarlet_program(mut self, program: impl Into<String>) -> Self {
        self.config.xmlstarlet_program = program.into();
        self
    }

    pub fn pdftohtml_program(mut self, program: impl Into<String>) -> Self {
        self.config.pdftohtml_program = program.into();
        self
    }

    pub fn photo_max_dimension(mut self, px: u32) -> Self {
        self.config.photo_max_dimension = px;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q;
        self
    }

    pub fn reproducible_builds(mut self, v: bool) -> Self {
        self.config.reproducible_builds = v;
        self
    }

    pub fn coalesce_builds(mut self, v: bool) -> Self {
        self.config.coalesce_builds = v;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenditionConfig, RenditionError> {
        let c = &self.config;
        if c.cache_dir.as_os_str().is_empty() {
            return Err(RenditionError::InvalidConfig(
                "cache_dir must not be empty".into(),
            ));
        }
        if c.conversion_timeout_secs == 0 {
            return Err(RenditionError::InvalidConfig(
                "Conversion timeout must be ≥ 1s".into(),
            ));
        }
        if !(16..=4096).contains(&c.photo_max_dimension) {
            return Err(RenditionError::InvalidConfig(format!(
                "Photo max dimension must be 16–4096, got {}",
                c.photo_max_dimension
            )));
        }
        if !(1..=100).contains(&c.jpeg_quality) {
            return Err(RenditionError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        Ok(self.config)
    }
}
