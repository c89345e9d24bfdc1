//! Conversion pipeline: turn one source document into one rendition.
//!
//! Each submodule implements exactly one step, so each is independently
//! testable and the external tools can be swapped without touching the cache.
//!
//! ## Data Flow
//!
//! ```text
//! classify ──▶ plan ──▶ command / photo ──▶ postprocess
//! (magic bytes) (format × kind) (tool or in-process) (embed cleanup)
//! ```
//!
//! 1. [`classify`]    : detect the source format from magic bytes, then the
//!    extension, defaulting to PDF
//! 2. [`plan`]        : pick one [`ConversionPlan`] per (format, kind) pair
//! 3. [`command`]     : run an external converter with a timeout, capturing
//!    stdout
//! 4. [`photo`]       : decode/resize/encode photographs in `spawn_blocking`
//! 5. [`postprocess`] : finish tool output for embedding (`<pre>` wrapping,
//!    XML declaration removal)

pub mod classify;
pub mod command;
pub mod photo;
pub mod plan;
pub mod postprocess;

pub use classify::{classify, detect, Detected, SourceFormat};
pub use plan::ConversionPlan;

use crate::artifact::TargetKind;
use crate::config::RenditionConfig;
use crate::error::ConversionError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Input of one conversion. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub id: String,
    /// Local path of the source document.
    pub source: PathBuf,
    pub format: SourceFormat,
    pub kind: TargetKind,
    /// Modification time of the source, used to pin embedded timestamps.
    pub source_modified: SystemTime,
}

/// Produces rendition bytes for a classified source.
///
/// Implementations must be deterministic for a given source and kind (up to
/// embedded metadata) and must not write into the artifact cache; publishing
/// is the cache's job.
#[async_trait]
pub trait ConversionPipeline: Send + Sync {
    async fn convert(&self, request: &ConversionRequest) -> Result<Vec<u8>, ConversionError>;
}

/// The production pipeline: external converters plus in-process photo scaling.
#[derive(Debug, Clone)]
pub struct ExternalPipeline {
    config: RenditionConfig,
}

impl ExternalPipeline {
    pub fn new(config: RenditionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConversionPipeline for ExternalPipeline {
    async fn convert(&self, request: &ConversionRequest) -> Result<Vec<u8>, ConversionError> {
        let timeout = Duration::from_secs(self.config.conversion_timeout_secs);

        match plan::plan(request, &self.config)? {
            ConversionPlan::Tool { command, finish } => {
                let raw = command::run_tool(&command, timeout).await?;
                Ok(finish.apply(raw))
            }
            ConversionPlan::Passthrough => {
                debug!("Passing {} through unchanged", request.id);
                tokio::fs::read(&request.source)
                    .await
                    .map_err(|source| ConversionError::Io {
                        path: request.source.clone(),
                        source,
                    })
            }
            ConversionPlan::ScaleJpeg {
                max_dimension,
                quality,
            } => photo::scale_to_jpeg(&request.source, max_dimension, quality).await,
        }
    }
}
