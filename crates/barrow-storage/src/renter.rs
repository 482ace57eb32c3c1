//! Reference adapter for an asynchronous renter-style remote.
//!
//! The remote's API is fire-and-forget: an upload request is done when the
//! file shows up as available in the renter's file list, a download request
//! is done when its queue entry reports every byte received. Transfers
//! stage through local temp files whose names are keyed by a content hash,
//! so concurrent workers moving the same chunk never collide.
//!
//! A failed upload leaves no local state behind but may leave a partial
//! remote object; those are invisible (only available files are listed) and
//! the fossil collector reaps them.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use barrow_chunk::Chunk;
use barrow_crypto::zbase32;

use crate::backend::{FileEntry, FileInfo, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::layout::StorageLayout;
use crate::waiter::{PollInterval, Waiter};

/// One file known to the renter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenterFile {
    pub path: String,
    pub size: u64,
    pub available: bool,
}

/// One entry in the renter's download queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenterDownload {
    pub path: String,
    pub received: u64,
    pub length: u64,
}

/// Minimal client surface of the renter API. The HTTP transport behind it
/// is provider plumbing and lives with the frontend.
#[async_trait]
pub trait RenterApi: Send + Sync {
    /// Number of currently formed storage contracts.
    async fn contract_count(&self) -> StorageResult<usize>;

    /// Every file in the renter, in one response.
    async fn files(&self) -> StorageResult<Vec<RenterFile>>;

    /// The current download queue.
    async fn downloads(&self) -> StorageResult<Vec<RenterDownload>>;

    /// Ask the renter to ingest the local file `source` as `remote_path`.
    async fn upload(&self, remote_path: &str, source: &Path) -> StorageResult<()>;

    /// Ask the renter to fetch `remote_path` into the local `destination`.
    async fn download(&self, remote_path: &str, destination: &Path) -> StorageResult<()>;

    /// Rename a remote file.
    async fn rename(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Delete a remote file; deleting a missing file is not an error.
    async fn delete(&self, remote_path: &str) -> StorageResult<()>;
}

pub struct RenterBackend<C> {
    layout: StorageLayout,
    client: C,
    staging_dir: PathBuf,
    waiter: Box<dyn Waiter>,
}

impl<C: RenterApi> RenterBackend<C> {
    /// Connect the adapter, verifying the renter can actually store data.
    pub async fn new(storage_dir: &str, client: C) -> StorageResult<Self> {
        Self::with_waiter(storage_dir, client, Box::new(PollInterval::default())).await
    }

    /// Same as [`RenterBackend::new`] with an explicit polling waiter.
    pub async fn with_waiter(
        storage_dir: &str,
        client: C,
        waiter: Box<dyn Waiter>,
    ) -> StorageResult<Self> {
        if client.contract_count().await? == 0 {
            return Err(StorageError::NoContracts);
        }
        Ok(Self {
            layout: StorageLayout::new(storage_dir),
            client,
            staging_dir: std::env::temp_dir(),
            waiter,
        })
    }

    /// Stage files somewhere other than the system temp directory.
    pub fn set_staging_dir(&mut self, dir: impl Into<PathBuf>) {
        self.staging_dir = dir.into();
    }

    /// A filename-safe staging prefix derived from `seed`. The random
    /// suffix the temp-file builder appends keeps parallel workers apart
    /// even for identical seeds.
    fn staging_prefix(seed: &[u8]) -> String {
        zbase32::encode(&Sha256::digest(seed))
    }
}

#[async_trait]
impl<C: RenterApi> StorageBackend for RenterBackend<C> {
    async fn list_files(&self, _worker: usize, dir: &str) -> StorageResult<Vec<FileEntry>> {
        let mut dir = dir.to_string();
        if !dir.is_empty() && !dir.ends_with('/') {
            dir.push('/');
        }
        let prefix = format!("{}/{}", self.layout.storage_dir(), dir);

        // One request returns the whole namespace; everything below is
        // client-side filtering.
        let files = self.client.files().await?;
        let mut entries = Vec::new();

        if dir == "snapshots/" {
            let mut seen = std::collections::BTreeSet::new();
            for file in &files {
                if let Some(rest) = file.path.strip_prefix(&prefix) {
                    if let Some((snapshot_id, _)) = rest.split_once('/') {
                        if seen.insert(snapshot_id.to_string()) {
                            entries.push(FileEntry {
                                name: format!("{snapshot_id}/"),
                                size: 0,
                            });
                        }
                    }
                }
            }
        } else {
            // The renter namespace is flat: chunk listings return the whole
            // remainder (shard separators included) with sizes.
            for file in &files {
                if let Some(rest) = file.path.strip_prefix(&prefix) {
                    if !rest.is_empty() {
                        entries.push(FileEntry {
                            name: rest.to_string(),
                            size: file.size,
                        });
                    }
                }
            }
        }
        Ok(entries)
    }

    async fn get_file_info(&self, _worker: usize, path: &str) -> StorageResult<Option<FileInfo>> {
        let full = self.layout.full_path(path);
        let files = self.client.files().await?;
        Ok(files.iter().find(|f| f.path == full).map(|f| FileInfo {
            is_dir: false,
            size: f.size,
        }))
    }

    async fn upload_file(&self, _worker: usize, path: &str, content: &[u8]) -> StorageResult<()> {
        let remote_path = self.layout.full_path(path);

        // Stage under a content-keyed name so concurrent uploads of the
        // same chunk never collide; dropped on every exit path.
        let mut staged = tempfile::Builder::new()
            .prefix(&Self::staging_prefix(content))
            .tempfile_in(&self.staging_dir)?;
        staged.write_all(content)?;
        staged.flush()?;

        self.client.upload(&remote_path, staged.path()).await?;

        let mut attempt = 0;
        loop {
            let files = self.client.files().await?;
            let uploaded = files
                .iter()
                .find(|f| f.path == remote_path)
                .is_some_and(|f| f.available);
            if uploaded {
                debug!(path = %remote_path, size = content.len(), "upload available");
                return Ok(());
            }
            self.waiter.wait("upload", path, attempt).await?;
            attempt += 1;
        }
    }

    async fn download_file(
        &self,
        _worker: usize,
        path: &str,
        chunk: &mut Chunk,
    ) -> StorageResult<()> {
        let remote_path = self.layout.full_path(path);

        // Random seed: parallel workers fetching the same chunk must land
        // in distinct files.
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        let staged = tempfile::Builder::new()
            .prefix(&Self::staging_prefix(&seed))
            .tempfile_in(&self.staging_dir)?;

        self.client.download(&remote_path, staged.path()).await?;

        let mut attempt = 0;
        loop {
            let queue = self.client.downloads().await?;
            let done = queue
                .iter()
                .find(|entry| entry.path == remote_path)
                .is_some_and(|entry| entry.length > 0 && entry.received == entry.length);
            if done {
                break;
            }
            self.waiter.wait("download", path, attempt).await?;
            attempt += 1;
        }

        let content = tokio::fs::read(staged.path()).await?;
        chunk.write_all(&content)?;
        debug!(path = %remote_path, size = content.len(), "download complete");
        Ok(())
    }

    async fn move_file(&self, _worker: usize, from: &str, to: &str) -> StorageResult<()> {
        self.client
            .rename(&self.layout.full_path(from), &self.layout.full_path(to))
            .await
    }

    async fn delete_file(&self, _worker: usize, path: &str) -> StorageResult<()> {
        match self.client.delete(&self.layout.full_path(path)).await {
            Err(StorageError::NotFound { .. }) => Ok(()),
            other => other,
        }
    }

    async fn create_directory(&self, _worker: usize, _dir: &str) -> StorageResult<()> {
        Ok(())
    }

    fn is_cache_needed(&self) -> bool {
        true
    }

    fn is_move_file_implemented(&self) -> bool {
        true
    }

    fn is_strong_consistent(&self) -> bool {
        false
    }

    fn is_fast_listing(&self) -> bool {
        true
    }
}
