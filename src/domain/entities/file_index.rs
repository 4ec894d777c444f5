//! File index entity - content-addressed manifest of a deploy's files
//!
//! Describes what files exist and their identity (path, size, fingerprint),
//! independent of any destination. Built once when a deploy is finalized
//! and never mutated afterwards; the freeze is enforced by [`Deploy`],
//! which owns the index.
//!
//! [`Deploy`]: super::deploy::Deploy

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Fingerprint, SitePath};

/// Error when building a file index
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("duplicate path '{0}' in file index")]
    DuplicatePath(SitePath),
}

/// One file in a deploy's index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIndexEntry {
    /// Normalized site path (leading slash)
    pub path: SitePath,
    /// Content size in bytes
    pub size: u64,
    /// Strong content hash
    pub fingerprint: Fingerprint,
    /// Optional content-type hint from the build collaborator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl FileIndexEntry {
    pub fn new(path: SitePath, size: u64, fingerprint: Fingerprint) -> Self {
        Self {
            path,
            size,
            fingerprint,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Content-addressed description of a deploy's files
///
/// Paths are unique within one index; insertion order does not matter
/// (entries are kept sorted by path).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIndex {
    entries: BTreeMap<SitePath, FileIndexEntry>,
}

impl FileIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from entries, rejecting duplicate paths
    pub fn from_entries(
        entries: impl IntoIterator<Item = FileIndexEntry>,
    ) -> Result<Self, IndexError> {
        let mut index = Self::new();
        for entry in entries {
            index.insert(entry)?;
        }
        Ok(index)
    }

    /// Insert an entry; duplicate paths are an error
    pub fn insert(&mut self, entry: FileIndexEntry) -> Result<(), IndexError> {
        if self.entries.contains_key(&entry.path) {
            return Err(IndexError::DuplicatePath(entry.path));
        }
        self.entries.insert(entry.path.clone(), entry);
        Ok(())
    }

    /// Look up the entry for a path
    pub fn get(&self, path: &SitePath) -> Option<&FileIndexEntry> {
        self.entries.get(path)
    }

    /// Check whether a path exists in the index
    pub fn contains(&self, path: &SitePath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Total byte size across all entries
    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    /// Iterate entries in path order
    pub fn entries(&self) -> impl Iterator<Item = &FileIndexEntry> {
        self.entries.values()
    }

    /// Iterate paths in order
    pub fn paths(&self) -> impl Iterator<Item = &SitePath> {
        self.entries.keys()
    }
}
