// src/storage/store.rs
//! Content-addressed storage for identity packages.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::utils::crypto::{hash_data, to_lower_hex};

/// A file to be stored, named by its path inside the identity package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
    pub content: String,
}

impl StoredFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Where a stored file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub path: String,
    pub cid: String,
}

/// Storage the lifecycle publishes documents to and reads them back from.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Stores the files as one directory.
    ///
    /// Returns one entry per file, in input order, followed by the entry of
    /// the wrapping directory (empty path). Each file is then readable both
    /// by its own content identifier and as `<directory cid>/<path>`.
    async fn put(&self, files: Vec<StoredFile>) -> anyhow::Result<Vec<StoredEntry>>;

    /// Reads back the text stored under `locator`.
    async fn get(&self, locator: &str) -> anyhow::Result<String>;
}

/// Locator of `path` inside the directory of a [`ContentStore::put`] result.
pub fn directory_locator(entries: &[StoredEntry], path: &str) -> Option<String> {
    entries
        .last()
        .filter(|entry| entry.path.is_empty())
        .map(|dir| format!("{}/{}", dir.cid, path.trim_start_matches('/')))
}

/// Returns the locator of `file_name` next to the file at `locator`.
///
/// `Qm.../id/main.xml` becomes `Qm.../id/signature.xml`; a bare content
/// identifier gets `file_name` appended as a path.
pub fn sibling_locator(locator: &str, file_name: &str) -> String {
    match locator.rsplit_once('/') {
        Some((dir, _)) => format!("{}/{}", dir, file_name),
        None => format!("{}/{}", locator, file_name),
    }
}

/// In-process store addressed by the keccak-256 of the content.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of readable locators, directory paths included.
    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn content_id(data: &[u8]) -> String {
    to_lower_hex(&hash_data(data))
        .trim_start_matches("0x")
        .to_string()
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn put(&self, files: Vec<StoredFile>) -> anyhow::Result<Vec<StoredEntry>> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        let mut entries: Vec<StoredEntry> = Vec::with_capacity(files.len() + 1);
        let mut listing = String::new();
        for file in &files {
            let cid = content_id(file.content.as_bytes());
            listing.push_str(&format!("{} {}\n", file.path, cid));
            blobs.insert(cid.clone(), file.content.clone());
            entries.push(StoredEntry {
                path: file.path.clone(),
                cid,
            });
        }

        let dir_cid = content_id(listing.as_bytes());
        for file in files {
            blobs.insert(
                format!("{}/{}", dir_cid, file.path.trim_start_matches('/')),
                file.content,
            );
        }
        log::debug!("stored {} files under {}", entries.len(), dir_cid);
        entries.push(StoredEntry {
            path: String::new(),
            cid: dir_cid,
        });
        Ok(entries)
    }

    async fn get(&self, locator: &str) -> anyhow::Result<String> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        blobs
            .get(locator)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("nothing stored under {}", locator))
    }
}
