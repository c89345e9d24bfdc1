//! Collaborator seams: where source documents and ballots come from.
//!
//! The cache and the tally aggregator never open storage themselves; they ask
//! a [`DocumentStore`] or a [`BallotStore`]. The filesystem and in-memory
//! implementations here cover the command-line tool and the tests.

use crate::cache::layout::is_valid_id;
use crate::error::StoreError;
use crate::pipeline::classify;
use crate::tally::Ballot;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Resolves document ids to their source files.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Local path of the source document. `NotFound` when it does not exist.
    async fn resolve_source_path(&self, id: &str) -> Result<PathBuf, StoreError>;

    /// Last modification time of the source document.
    async fn source_modified_time(&self, id: &str) -> Result<SystemTime, StoreError>;

    /// Content type the raw passthrough is served with, if known.
    async fn source_content_type(&self, id: &str) -> Result<Option<String>, StoreError>;
}

/// Source documents stored as `<root>/<id>`.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        // An id that cannot name a file here has no document.
        if !is_valid_id(id) {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(self.root.join(id))
    }

    async fn metadata(&self, id: &str) -> Result<(PathBuf, std::fs::Metadata), StoreError> {
        let path = self.path_for(id)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok((path, meta)),
            Ok(_) => Err(StoreError::NotFound { id: id.to_string() }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound { id: id.to_string() })
            }
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn resolve_source_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        let (path, _) = self.metadata(id).await?;
        Ok(path)
    }

    async fn source_modified_time(&self, id: &str) -> Result<SystemTime, StoreError> {
        let (path, meta) = self.metadata(id).await?;
        meta.modified()
            .map_err(|source| StoreError::Io { path, source })
    }

    async fn source_content_type(&self, id: &str) -> Result<Option<String>, StoreError> {
        let (path, _) = self.metadata(id).await?;
        let detected = classify::detect(&path).await;
        Ok(Some(detected.content_type.to_string()))
    }
}

/// Supplies the raw ballot rows of a decision.
#[async_trait]
pub trait BallotStore: Send + Sync {
    /// All ballots recorded for `decision_id`; empty when none were cast.
    async fn ballots_for(&self, decision_id: &str) -> Result<Vec<Ballot>, StoreError>;
}

/// Ballots held in memory, grouped by decision.
#[derive(Debug, Clone, Default)]
pub struct MemoryBallotStore {
    by_decision: HashMap<String, Vec<Ballot>>,
}

impl MemoryBallotStore {
    pub fn new(ballots: impl IntoIterator<Item = Ballot>) -> Self {
        let mut store = Self::default();
        for b in ballots {
            store.push(b);
        }
        store
    }

    pub fn push(&mut self, ballot: Ballot) {
        self.by_decision
            .entry(ballot.decision_id.clone())
            .or_default()
            .push(ballot);
    }

    pub fn decision_count(&self) -> usize {
        self.by_decision.len()
    }

    /// Load ballots from a JSON array file.
    pub async fn load_json(path: &Path) -> Result<Self, StoreError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let ballots: Vec<Ballot> = serde_json::from_str(&text).map_err(|e| {
            StoreError::Backend(format!("Malformed ballots in {}: {e}", path.display()))
        })?;
        debug!("Loaded {} ballots from {}", ballots.len(), path.display());
        Ok(Self::new(ballots))
    }
}

#[async_trait]
impl BallotStore for MemoryBallotStore {
    async fn ballots_for(&self, decision_id: &str) -> Result<Vec<Ballot>, StoreError> {
        Ok(self
            .by_decision
            .get(decision_id)
            .cloned()
            .unwrap_or_default())
    }
}
