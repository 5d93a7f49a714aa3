//! Change-detection store: the fingerprints of every posting already
//! notified, persisted as a sorted JSON array.
//!
//! The set only grows; nothing is ever evicted.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::AppError;

/// Fingerprints known so far. Ordered so serialization is byte-for-byte
/// reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    fingerprints: BTreeSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Returns true when the fingerprint was not known yet.
    pub fn insert(&mut self, fingerprint: String) -> bool {
        self.fingerprints.insert(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    pub fn is_superset(&self, other: &SeenSet) -> bool {
        self.fingerprints.is_superset(&other.fingerprints)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fingerprints.iter().map(String::as_str)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, AppError> {
        let mut bytes = serde_json::to_vec_pretty(&self.fingerprints)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

impl FromIterator<String> for SeenSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            fingerprints: iter.into_iter().collect(),
        }
    }
}

/// File-backed [`SeenSet`].
#[derive(Debug, Clone)]
pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the set. A missing or unreadable file is an empty set, never an error.
    pub async fn load(&self) -> SeenSet {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No store at {}, starting empty", self.path.display());
                return SeenSet::new();
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}; starting empty", self.path.display());
                return SeenSet::new();
            }
        };

        match serde_json::from_slice::<Vec<String>>(&bytes) {
            Ok(list) => list.into_iter().collect(),
            Err(e) => {
                tracing::warn!("Corrupt store {}: {e}; starting empty", self.path.display());
                SeenSet::new()
            }
        }
    }

    /// Write atomically: temp file beside the target, then rename.
    pub async fn save(&self, seen: &SeenSet) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&seen.to_json()?).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
