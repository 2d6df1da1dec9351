//! The persisted JSON cache. Only ever replaced whole: the new document is
//! written to a temp file beside the target and renamed over it.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::IgnoredAny;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use discover_common::DiscoverCache;

use crate::reconcile::PriorCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// State of the cache file before this run writes anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorState {
    Missing,
    /// Present but not a cache document. Left untouched unless replaced.
    Unreadable(String),
    Loaded(PriorCache),
}

impl PriorState {
    pub fn prior(&self) -> Option<PriorCache> {
        match self {
            PriorState::Loaded(prior) => Some(*prior),
            _ => None,
        }
    }
}

/// Only the story count matters for reconciliation; records are not parsed.
#[derive(Deserialize)]
struct CacheHeader {
    #[serde(default)]
    stories: Vec<IgnoredAny>,
}

pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_prior(&self) -> PriorState {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return PriorState::Missing,
            Err(e) => return PriorState::Unreadable(e.to_string()),
        };
        match serde_json::from_str::<CacheHeader>(&content) {
            Ok(header) => PriorState::Loaded(PriorCache {
                stories: header.stories.len(),
            }),
            Err(e) => PriorState::Unreadable(e.to_string()),
        }
    }

    pub fn write(&self, cache: &DiscoverCache) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(cache)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        std::fs::create_dir_all(&dir).map_err(io_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        info!(
            path = %self.path.display(),
            stories = cache.stories.len(),
            "Cache written"
        );
        Ok(())
    }
}
