//! # rendition-cache
//!
//! Serve HTML, PDF and JPEG renditions of stored documents, converting each
//! source at most once per change and reusing the result from disk after that.
//!
//! ## Why this crate?
//!
//! Converting an office document or a PDF into embeddable HTML means running
//! an external tool that takes seconds. Documents change rarely and are read
//! often, so each rendition is built once, published atomically into an
//! on-disk cache, and served from there until its source is modified again.
//! The same crate tallies the ballots attached to parliamentary decisions.
//!
//! ## Request Flow
//!
//! ```text
//! get_or_build(id, kind)
//!  │
//!  ├─ 1. Fresh?    cache entry exists, non-empty, mtime ≥ source mtime → serve
//!  ├─ 2. Resolve   document store yields the source path (or NotFound)
//!  ├─ 3. Classify  magic bytes → word-processor / rich-text / legacy-word /
//!  │               transcript-xml / pdf / photo
//!  ├─ 4. Convert   pandoc · catdoc · xmlstarlet · pdftohtml · in-process JPEG
//!  └─ 5. Publish   temp file + atomic rename; failure still returns the bytes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rendition_cache::{ArtifactCache, FsDocumentStore, RenditionConfig, TargetKind};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RenditionConfig::builder().cache_dir("doccache").build()?;
//!     let store = Arc::new(FsDocumentStore::new("docstore"));
//!     let cache = ArtifactCache::new(config, store);
//!
//!     let artifact = cache.get_or_build("doc-42", TargetKind::RenderedHtml).await?;
//!     println!("{} bytes ({:?})", artifact.bytes.len(), artifact.origin);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `rendition` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! rendition-cache = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! | Source | HTML | PDF | JPEG |
//! |--------|------|-----|------|
//! | `.docx`, `.rtf` | pandoc | pandoc + xelatex | n/a |
//! | `.doc` | catdoc, wrapped in `<pre>` | n/a | n/a |
//! | transcript XML | xmlstarlet + stylesheet | n/a | n/a |
//! | PDF | pdftohtml | source as-is | n/a |
//! | photo | n/a | n/a | in-process, no tool needed |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod cache;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod tally;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{Artifact, ArtifactOrigin, RawDocument, TargetKind};
pub use cache::ArtifactCache;
pub use config::{RenditionConfig, RenditionConfigBuilder};
pub use error::{ConversionError, RenditionError, StoreError, TallyError};
pub use pipeline::{
    classify, ConversionPipeline, ConversionRequest, ExternalPipeline, SourceFormat,
};
pub use progress::{CacheObserver, NoopObserver};
pub use store::{BallotStore, DocumentStore, FsDocumentStore, MemoryBallotStore};
pub use tally::{tally_ballots, Ballot, Stance, VoteMode, VoteResult, VoteTallyAggregator};
