//! Observer trait for cache events.
//!
//! Inject an [`Arc<dyn CacheObserver>`] via
//! [`crate::config::RenditionConfigBuilder::observer`] to receive events as
//! the cache serves hits, runs conversions and publishes artifacts.
//!
//! Callers can forward events to metrics, a terminal spinner, or a test
//! counter without the library knowing how the host application reports.
//!
//! # Example
//!
//! ```rust
//! use rendition_cache::{CacheObserver, RenditionConfig, TargetKind};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct HitCounter(AtomicUsize);
//!
//! impl CacheObserver for HitCounter {
//!     fn on_cache_hit(&self, _id: &str, _kind: TargetKind, _len: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = RenditionConfig::builder()
//!     .observer(Arc::new(HitCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::artifact::TargetKind;
use crate::pipeline::SourceFormat;
use std::sync::Arc;

/// Called by [`crate::cache::ArtifactCache`] as it serves requests.
///
/// Implementations must be `Send + Sync`: the cache is shared across request
/// workers and events for different ids arrive concurrently. All methods
/// default to no-ops.
pub trait CacheObserver: Send + Sync {
    /// A fresh cache entry was served.
    fn on_cache_hit(&self, id: &str, kind: TargetKind, len: usize) {
        let _ = (id, kind, len);
    }

    /// A conversion is about to run.
    fn on_build_start(&self, id: &str, kind: TargetKind, format: SourceFormat) {
        let _ = (id, kind, format);
    }

    /// A conversion finished and produced `len` bytes.
    ///
    /// `published` is false when the artifact could not be written to the
    /// cache (the bytes are still returned to the caller).
    fn on_build_complete(&self, id: &str, kind: TargetKind, len: usize, published: bool) {
        let _ = (id, kind, len, published);
    }

    /// The atomic publish of a freshly built artifact failed.
    fn on_publish_failed(&self, id: &str, kind: TargetKind, error: &str) {
        let _ = (id, kind, error);
    }
}

/// A no-op observer, the default when none is configured.
pub struct NoopObserver;

impl CacheObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::RenditionConfig`].
pub type SharedObserver = Arc<dyn CacheObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        hits: AtomicUsize,
        starts: AtomicUsize,
        unpublished: AtomicUsize,
    }

    impl CacheObserver for Tracking {
        fn on_cache_hit(&self, _id: &str, _kind: TargetKind, _len: usize) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }

        fn on_build_start(&self, _id: &str, _kind: TargetKind, _format: SourceFormat) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_build_complete(&self, _id: &str, _kind: TargetKind, _len: usize, published: bool) {
            if !published {
                self.unpublished.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_cache_hit("a", TargetKind::RenderedHtml, 10);
        o.on_build_start("a", TargetKind::RenderedHtml, SourceFormat::Pdf);
        o.on_build_complete("a", TargetKind::RenderedHtml, 10, true);
        o.on_publish_failed("a", TargetKind::RenderedHtml, "disk full");
    }

    #[test]
    fn tracking_observer_receives_events() {
        let t = Tracking::default();
        t.on_build_start("a", TargetKind::ScaledJpeg, SourceFormat::Photo);
        t.on_build_complete("a", TargetKind::ScaledJpeg, 512, false);
        t.on_cache_hit("a", TargetKind::ScaledJpeg, 512);

        assert_eq!(t.starts.load(Ordering::SeqCst), 1);
        assert_eq!(t.unpublished.load(Ordering::SeqCst), 1);
        assert_eq!(t.hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let o: SharedObserver = Arc::new(NoopObserver);
        o.on_cache_hit("b", TargetKind::RenderedPdf, 1);
    }
}
