//! The artifact cache: serve a fresh rendition or build and publish one.
//!
//! ## Freshness
//!
//! A cached artifact is used only if it exists, is non-empty, and its mtime
//! is not older than the source document's mtime. Anything else is treated
//! as absent. A cache file that exists but cannot be read is also treated as
//! absent: the request falls through to a rebuild instead of failing.
//!
//! ## Publishing
//!
//! New artifacts are published with a temp-file-plus-rename (see
//! [`publish`]). A failed publish is logged and the freshly built bytes are
//! still returned, marked [`ArtifactOrigin::BuiltUncached`].
//!
//! ## Concurrency
//!
//! Calls for different keys never interact. By default concurrent misses on
//! the same key each run the pipeline and the last rename wins; with
//! [`RenditionConfig::coalesce_builds`] they wait for a single build instead.

pub mod inflight;
pub mod layout;
pub mod publish;

use crate::artifact::{Artifact, ArtifactOrigin, RawDocument, TargetKind};
use crate::config::RenditionConfig;
use crate::error::RenditionError;
use crate::pipeline::{classify, ConversionPipeline, ConversionRequest, ExternalPipeline};
use crate::store::DocumentStore;
use futures::stream::{self, StreamExt};
use inflight::BuildLocks;
use layout::CacheLayout;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};

const RAW_FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Serves renditions of source documents, building them on a miss.
///
/// Cheap to share: wrap it in an `Arc` and call it from every request worker.
pub struct ArtifactCache {
    config: RenditionConfig,
    layout: CacheLayout,
    store: Arc<dyn DocumentStore>,
    pipeline: Arc<dyn ConversionPipeline>,
    inflight: Option<BuildLocks>,
}

impl ArtifactCache {
    /// A cache driving the external converters configured in `config`.
    pub fn new(config: RenditionConfig, store: Arc<dyn DocumentStore>) -> Self {
        let pipeline = Arc::new(ExternalPipeline::new(config.clone()));
        Self::with_pipeline(config, store, pipeline)
    }

    /// A cache driving a caller-supplied pipeline.
    pub fn with_pipeline(
        config: RenditionConfig,
        store: Arc<dyn DocumentStore>,
        pipeline: Arc<dyn ConversionPipeline>,
    ) -> Self {
        let inflight = config.coalesce_builds.then(BuildLocks::new);
        Self {
            layout: CacheLayout::new(&config.cache_dir),
            config,
            store,
            pipeline,
            inflight,
        }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn config(&self) -> &RenditionConfig {
        &self.config
    }

    /// Return the `kind` rendition of `id`, building it if missing or stale.
    ///
    /// # Errors
    /// * [`RenditionError::InvalidId`] when `id` cannot name a cache file
    /// * [`RenditionError::NotFound`] when the store has no source for `id`
    /// * [`RenditionError::Conversion`] when the pipeline fails; nothing is
    ///   published in that case
    pub async fn get_or_build(&self, id: &str, kind: TargetKind) -> Result<Artifact, RenditionError> {
        let cache_path = self.layout.artifact_path(id, kind)?;
        let source_modified = self.store.source_modified_time(id).await?;

        if let Some(artifact) = self.serve_fresh(id, kind, &cache_path, source_modified).await {
            return Ok(artifact);
        }

        let _build_guard = match &self.inflight {
            Some(locks) => {
                let guard = locks.acquire(id, kind).await;
                // Another caller may have published while we waited.
                if let Some(artifact) =
                    self.serve_fresh(id, kind, &cache_path, source_modified).await
                {
                    return Ok(artifact);
                }
                Some(guard)
            }
            None => None,
        };

        self.build(id, kind, &cache_path, source_modified).await
    }

    /// Return the unconverted source bytes of `id` with its content type.
    pub async fn raw(&self, id: &str) -> Result<RawDocument, RenditionError> {
        if !layout::is_valid_id(id) {
            return Err(RenditionError::InvalidId { id: id.to_string() });
        }
        let path = self.store.resolve_source_path(id).await?;
        let bytes = tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                RenditionError::NotFound { id: id.to_string() }
            } else {
                RenditionError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        let content_type = self
            .store
            .source_content_type(id)
            .await?
            .unwrap_or_else(|| RAW_FALLBACK_CONTENT_TYPE.to_string());

        debug!("Raw {} ({}, {} bytes)", id, content_type, bytes.len());
        Ok(RawDocument {
            id: id.to_string(),
            content_type,
            bytes,
        })
    }

    /// `get_or_build` for many ids, at most `concurrency` at a time.
    ///
    /// Results come back in the order of `ids`; one failure does not stop
    /// the others.
    pub async fn get_or_build_many(
        &self,
        ids: &[String],
        kind: TargetKind,
        concurrency: usize,
    ) -> Vec<(String, Result<Artifact, RenditionError>)> {
        let mut results: Vec<(usize, String, Result<Artifact, RenditionError>)> =
            stream::iter(ids.iter().enumerate().map(|(idx, id)| async move {
                (idx, id.clone(), self.get_or_build(id, kind).await)
            }))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        results.sort_by_key(|(idx, _, _)| *idx);
        results
            .into_iter()
            .map(|(_, id, result)| (id, result))
            .collect()
    }

    /// Read the cache entry if it is present, non-empty and fresh.
    async fn serve_fresh(
        &self,
        id: &str,
        kind: TargetKind,
        cache_path: &Path,
        source_modified: SystemTime,
    ) -> Option<Artifact> {
        let bytes = read_fresh(cache_path, source_modified).await?;
        debug!("Cache hit {} ({}, {} bytes)", id, kind, bytes.len());
        if let Some(ref obs) = self.config.observer {
            obs.on_cache_hit(id, kind, bytes.len());
        }
        Some(Artifact {
            id: id.to_string(),
            kind,
            bytes,
            origin: ArtifactOrigin::CacheHit,
        })
    }

    async fn build(
        &self,
        id: &str,
        kind: TargetKind,
        cache_path: &Path,
        source_modified: SystemTime,
    ) -> Result<Artifact, RenditionError> {
        let source = self.store.resolve_source_path(id).await?;
        let format = classify(&source).await;

        info!("Building {} {} from {} source", id, kind, format);
        if let Some(ref obs) = self.config.observer {
            obs.on_build_start(id, kind, format);
        }

        let start = Instant::now();
        let request = ConversionRequest {
            id: id.to_string(),
            source,
            format,
            kind,
            source_modified,
        };
        let bytes = self.pipeline.convert(&request).await.map_err(|e| {
            warn!("Conversion of {} to {} failed: {}", id, kind, e);
            RenditionError::from(e)
        })?;

        let published = match publish::publish_atomic(cache_path, &bytes).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Could not publish {} to {}: {}",
                    id,
                    cache_path.display(),
                    e
                );
                if let Some(ref obs) = self.config.observer {
                    obs.on_publish_failed(id, kind, &e.to_string());
                }
                false
            }
        };

        info!(
            "Built {} {} ({} bytes, {}ms{})",
            id,
            kind,
            bytes.len(),
            start.elapsed().as_millis(),
            if published { "" } else { ", uncached" }
        );
        if let Some(ref obs) = self.config.observer {
            obs.on_build_complete(id, kind, bytes.len(), published);
        }

        Ok(Artifact {
            id: id.to_string(),
            kind,
            bytes,
            origin: if published {
                ArtifactOrigin::Built
            } else {
                ArtifactOrigin::BuiltUncached
            },
        })
    }
}

/// Bytes of `path` if it is a non-empty file at least as new as the source.
async fn read_fresh(path: &Path, source_modified: SystemTime) -> Option<Vec<u8>> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Cannot stat cache entry {}: {}", path.display(), e);
            return None;
        }
    };
    if !meta.is_file() || meta.len() == 0 {
        return None;
    }
    // No mtime support means freshness cannot be shown.
    let cached_modified = meta.modified().ok()?;
    if cached_modified < source_modified {
        debug!("Stale cache entry {}", path.display());
        return None;
    }

    match tokio::fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(
                "Cache entry {} unreadable, rebuilding: {}",
                path.display(),
                e
            );
            None
        }
    }
}
