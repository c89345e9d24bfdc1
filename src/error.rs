//! Error types for the rendition-cache library.
//!
//! Four error types reflect four distinct failure domains:
//!
//! * [`RenditionError`]: **fatal** for one `get_or_build` / `raw` call: the
//!   source is missing, the id is malformed, or the conversion failed. The
//!   serving layer maps `NotFound`/`InvalidId` to a "not found" response and
//!   everything else to a generic server error.
//!
//! * [`ConversionError`]: a single pipeline invocation failed (tool missing,
//!   crashed, timed out, or no pipeline exists for the format/target pair).
//!   Never leaves a partial artifact on disk.
//!
//! * [`StoreError`]: an external collaborator (document or ballot store)
//!   could not answer.
//!
//! * [`TallyError`]: a decision could not be tallied. `NoBallots` is not a
//!   system failure: it means the decision was never put to a contested vote.
//!
//! Cache read and publish failures have no variant: they are
//! recovered locally (rebuild from source / return the bytes uncached).

use crate::artifact::TargetKind;
use crate::pipeline::SourceFormat;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// All fatal errors returned by [`crate::cache::ArtifactCache`].
#[derive(Debug, Error)]
pub enum RenditionError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No source document exists for the id.
    #[error("No source document for id '{id}'")]
    NotFound { id: String },

    /// The id cannot name a file inside the store (separator, `..`, NUL …).
    #[error("Invalid document id '{id}'")]
    InvalidId { id: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The conversion pipeline failed for this source.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading the source document failed for a reason other than absence.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RenditionError {
    /// True when the serving layer should answer "not found" rather than
    /// a server-side failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RenditionError::NotFound { .. } | RenditionError::InvalidId { .. }
        )
    }
}

/// A failed conversion of one source document into one target kind.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The external tool could not be started (not installed, not executable).
    #[error("Unable to start '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but its output ended in an error state.
    #[error("'{tool}' failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Collecting the tool's output failed mid-run.
    #[error("Reading output of '{tool}' failed: {source}")]
    Stream {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool exceeded the configured timeout and was killed.
    #[error("'{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// No pipeline exists for this source format and target kind.
    #[error("Cannot render {format} source as {kind}")]
    Unsupported {
        format: SourceFormat,
        kind: TargetKind,
    },

    /// Raster decode, resize or JPEG encode failed.
    #[error("Image conversion failed: {detail}")]
    Image { detail: String },

    /// Reading the source for an in-process conversion failed.
    #[error("Failed to read source '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure reported by an external document or ballot store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No record for id '{id}'")]
    NotFound { id: String },

    #[error("Store I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for RenditionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { id } => RenditionError::NotFound { id },
            StoreError::Io { path, source } => RenditionError::Io { path, source },
            StoreError::Backend(msg) => RenditionError::Internal(msg),
        }
    }
}

/// Errors returned by [`crate::tally::VoteTallyAggregator::tally`].
#[derive(Debug, Error)]
pub enum TallyError {
    /// The decision has no ballot rows: it was not put to a contested vote.
    #[error("No recorded ballots for decision '{decision_id}'")]
    NoBallots { decision_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
