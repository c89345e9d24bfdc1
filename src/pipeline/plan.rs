//! Conversion planning: one variant per way a rendition is produced.
//!
//! Planning is pure: it maps a (format, target) pair plus configuration onto a
//! [`ConversionPlan`] without touching the filesystem, so the full matrix is
//! testable without any converter installed.

use super::command::ToolCommand;
use super::postprocess::Finish;
use super::{ConversionRequest, SourceFormat};
use crate::artifact::TargetKind;
use crate::config::RenditionConfig;
use crate::error::ConversionError;
use std::time::UNIX_EPOCH;

/// How one rendition is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionPlan {
    /// Run an external tool and finish its stdout.
    Tool { command: ToolCommand, finish: Finish },
    /// The source already is the target representation.
    Passthrough,
    /// Decode and downscale in-process, re-encode as JPEG.
    ScaleJpeg { max_dimension: u32, quality: u8 },
}

/// Choose the conversion for `request`.
pub fn plan(
    request: &ConversionRequest,
    config: &RenditionConfig,
) -> Result<ConversionPlan, ConversionError> {
    use SourceFormat as F;
    use TargetKind as K;

    let plan = match (request.format, request.kind) {
        (F::WordProcessor, K::RenderedHtml) => tool(pandoc_html(request, config, "docx")),
        (F::RichText, K::RenderedHtml) => tool(pandoc_html(request, config, "rtf")),
        (F::WordProcessor, K::RenderedPdf) => ConversionPlan::Tool {
            command: pandoc_pdf(request, config, "docx"),
            finish: Finish::AsIs,
        },
        (F::RichText, K::RenderedPdf) => ConversionPlan::Tool {
            command: pandoc_pdf(request, config, "rtf"),
            finish: Finish::AsIs,
        },
        (F::LegacyWord, K::RenderedHtml) => ConversionPlan::Tool {
            command: ToolCommand::new(&config.catdoc_program).arg(&request.source),
            finish: Finish::Preformatted,
        },
        (F::TranscriptXml, K::RenderedHtml) => ConversionPlan::Tool {
            command: ToolCommand::new(&config.xmlstarlet_program)
                .arg("tr")
                .arg(&config.transcript_stylesheet)
                .arg(&request.source),
            finish: Finish::Fragment,
        },
        (F::Pdf, K::RenderedHtml) => tool(
            ToolCommand::new(&config.pdftohtml_program)
                .arg("-s")
                .arg("-dataurls")
                .arg("-stdout")
                .arg(&request.source),
        ),
        (F::Pdf, K::RenderedPdf) => ConversionPlan::Passthrough,
        (F::Photo, K::ScaledJpeg) => ConversionPlan::ScaleJpeg {
            max_dimension: config.photo_max_dimension,
            quality: config.jpeg_quality,
        },
        (format, kind) => return Err(ConversionError::Unsupported { format, kind }),
    };

    Ok(with_source_date(plan, request, config))
}

fn tool(command: ToolCommand) -> ConversionPlan {
    ConversionPlan::Tool {
        command,
        finish: Finish::AsIs,
    }
}

fn pandoc_html(request: &ConversionRequest, config: &RenditionConfig, from: &str) -> ToolCommand {
    ToolCommand::new(&config.pandoc_program)
        .arg("-s")
        .arg("-f")
        .arg(from)
        .arg("--embed-resources")
        .arg("--variable")
        .arg(format!("maxwidth={}", config.max_content_width))
        .arg("-t")
        .arg("html")
        .arg(&request.source)
}

fn pandoc_pdf(request: &ConversionRequest, config: &RenditionConfig, from: &str) -> ToolCommand {
    ToolCommand::new(&config.pandoc_program)
        .arg("-s")
        .arg("--metadata")
        .arg(format!("margin-left:{}", config.pdf_margin))
        .arg("--metadata")
        .arg(format!("margin-right:{}", config.pdf_margin))
        .arg("-V")
        .arg(format!("fontfamily={}", config.pdf_font_family))
        .arg("--variable")
        .arg(format!("mainfont={}", config.pdf_main_font))
        .arg("--variable")
        .arg(format!("sansfont={}", config.pdf_sans_font))
        .arg(format!("--pdf-engine={}", config.pdf_engine))
        .arg("-f")
        .arg(from)
        .arg("-t")
        .arg("pdf")
        .arg("-o")
        .arg("-")
        .arg(&request.source)
}

/// Pin embedded timestamps to the source mtime.
fn with_source_date(
    plan: ConversionPlan,
    request: &ConversionRequest,
    config: &RenditionConfig,
) -> ConversionPlan {
    if !config.reproducible_builds {
        return plan;
    }
    let Ok(since_epoch) = request.source_modified.duration_since(UNIX_EPOCH) else {
        return plan;
    };
    match plan {
        ConversionPlan::Tool { command, finish } => ConversionPlan::Tool {
            command: command
                .env("SOURCE_DATE_EPOCH", since_epoch.as_secs().to_string())
                .env("FORCE_SOURCE_DATE", "1"),
            finish,
        },
        other => other,
    }
}
