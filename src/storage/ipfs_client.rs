// src/storage/ipfs_client.rs
//! IPFS storage client for identity packages.
//!
//! Stores the metadata document, signature document and referenced files
//! in IPFS and reads them back by content identifier (or `cid/path`).
//!
//! # Security Considerations
//! - All stored data is public by default (IPFS is a public network)
//! - Hashes are content-addressable and permanent

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::TryStreamExt;
use ipfs_api_backend_hyper::{IpfsApi, IpfsClient, TryFromUri};
use tokio::task;

use crate::config::Settings;
use crate::error::{IdentityError, Result};
use crate::storage::store::{ContentStore, StoredEntry, StoredFile};

/// Thread-safe IPFS client wrapper.
///
/// The hyper backend's futures are not `Send`, so every request runs on a
/// blocking thread with its own single-use runtime.
#[derive(Clone)]
pub struct IpfsStorage {
    /// Shared IPFS client instance (thread-safe via Arc)
    client: Arc<IpfsClient>,
}

impl IpfsStorage {
    /// Creates a client for the local IPFS node at `http://localhost:5001`.
    pub fn new() -> Self {
        IpfsStorage {
            client: Arc::new(IpfsClient::default()),
        }
    }

    /// Creates a client for the node at `url`.
    pub fn with_url(url: &str) -> Result<Self> {
        let client = IpfsClient::from_str(url)
            .map_err(|e| IdentityError::InvalidArgument(format!("Invalid IPFS API URL {}: {}", url, e)))?;
        Ok(IpfsStorage {
            client: Arc::new(client),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::with_url(&settings.ipfs_api_url)
    }

    /// Stores raw binary data and returns its CID.
    pub async fn store_data(&self, data: &[u8]) -> anyhow::Result<String> {
        let client = self.client.clone();
        let data_owned = data.to_vec();

        let res = task::spawn_blocking(move || -> anyhow::Result<String> {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            rt.block_on(async {
                let reader = Cursor::new(data_owned);
                let res = client
                    .add(reader)
                    .await
                    .map_err(|e| anyhow::anyhow!("IPFS add failed: {}", e))?;
                Ok(res.hash)
            })
        })
        .await??;

        Ok(res)
    }

    /// Adds a local directory recursively and returns the node's entries,
    /// the directory itself last.
    async fn store_directory(&self, dir: PathBuf) -> anyhow::Result<Vec<(String, String)>> {
        let client = self.client.clone();

        let res = task::spawn_blocking(move || -> anyhow::Result<Vec<(String, String)>> {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            rt.block_on(async {
                let added = client
                    .add_path(&dir)
                    .await
                    .map_err(|e| anyhow::anyhow!("IPFS add of {} failed: {}", dir.display(), e))?;
                Ok(added.into_iter().map(|r| (r.name, r.hash)).collect())
            })
        })
        .await??;

        Ok(res)
    }

    /// Retrieves binary data by CID or `cid/path`.
    pub async fn retrieve_data(&self, locator: &str) -> anyhow::Result<Vec<u8>> {
        let client = self.client.clone();
        let locator = locator.to_string();

        let data = task::spawn_blocking(move || -> anyhow::Result<BytesMut> {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            rt.block_on(async {
                client
                    .cat(&locator)
                    .map_ok(|chunk| chunk.to_vec())
                    .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                        acc.extend_from_slice(&chunk);
                        Ok(acc)
                    })
                    .await
                    .map_err(|e| anyhow::anyhow!("IPFS cat {} failed: {}", locator, e))
            })
        })
        .await??;

        Ok(data.to_vec())
    }
}

impl Default for IpfsStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for IpfsStorage {
    async fn put(&self, files: Vec<StoredFile>) -> anyhow::Result<Vec<StoredEntry>> {
        let staging = std::env::temp_dir().join(format!("iid-package-{:016x}", rand::random::<u64>()));
        let added = match stage_files(&staging, &files) {
            Ok(()) => self.store_directory(staging.clone()).await,
            Err(e) => Err(e),
        };
        fs::remove_dir_all(&staging).ok();
        let added = added?;

        let entries = package_entries(&files, &added)?;
        if let Some(dir) = entries.last() {
            log::info!("stored {} files in IPFS under {}", files.len(), dir.cid);
        }
        Ok(entries)
    }

    async fn get(&self, locator: &str) -> anyhow::Result<String> {
        let bytes = self.retrieve_data(locator).await?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// Matches the `(name, hash)` pairs reported by an `add` of the staged
/// directory to the files that were staged.
///
/// The node names files `<directory>/<path>` and the directory itself by its
/// bare name. Entries come back in file order, the directory last.
fn package_entries(files: &[StoredFile], added: &[(String, String)]) -> anyhow::Result<Vec<StoredEntry>> {
    let dir_cid = added
        .iter()
        .find(|(name, _)| !name.is_empty() && !name.contains('/'))
        .map(|(_, hash)| hash.clone())
        .ok_or_else(|| anyhow::anyhow!("IPFS did not report the package directory"))?;

    let mut entries = Vec::with_capacity(files.len() + 1);
    for file in files {
        let path = file.path.trim_start_matches('/');
        let cid = added
            .iter()
            .find(|(name, _)| name.split_once('/').map(|(_, rest)| rest) == Some(path))
            .map(|(_, hash)| hash.clone())
            .ok_or_else(|| anyhow::anyhow!("IPFS did not report {}", file.path))?;
        entries.push(StoredEntry {
            path: file.path.clone(),
            cid,
        });
    }
    entries.push(StoredEntry {
        path: String::new(),
        cid: dir_cid,
    });
    Ok(entries)
}

/// Writes `files` below `root`, creating intermediate directories.
fn stage_files(root: &Path, files: &[StoredFile]) -> anyhow::Result<()> {
    for file in files {
        let path = root.join(file.path.trim_start_matches('/'));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &file.content)?;
    }
    Ok(())
}
