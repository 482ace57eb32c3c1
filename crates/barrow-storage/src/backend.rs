//! The storage backend contract.

use async_trait::async_trait;

use barrow_chunk::Chunk;

use crate::error::StorageResult;

/// One listing entry. Directories carry a trailing `/` in `name`; sizes are
/// meaningful for files (chunk listings rely on them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

impl FileEntry {
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }
}

/// Result of a stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub is_dir: bool,
    pub size: u64,
}

/// Where a chunk (or its fossil) was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundChunk {
    pub path: String,
    pub size: u64,
}

/// Logical path of a chunk file. Fossils are chunks renamed aside by the
/// two-step collector and carry the `.fsl` suffix.
pub fn chunk_path(chunk_id: &str, is_fossil: bool) -> String {
    if is_fossil {
        format!("chunks/{chunk_id}.fsl")
    } else {
        format!("chunks/{chunk_id}")
    }
}

/// Logical path of a snapshot revision file.
pub fn snapshot_path(snapshot_id: &str, revision: u32) -> String {
    format!("snapshots/{snapshot_id}/{revision}")
}

/// Uniform contract over heterogeneous remote object stores.
///
/// Implementations must be callable from any number of workers
/// concurrently; the `worker` index only labels the call for the caller's
/// per-worker rate-limit accounting. Paths are logical (`chunks/...`,
/// `snapshots/...`) with `/` as the separator; adapters map them to
/// physical locations through their [`crate::StorageLayout`].
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Names directly under `dir`, one level deep; subdirectories come back
    /// with a trailing `/`.
    async fn list_files(&self, worker: usize, dir: &str) -> StorageResult<Vec<FileEntry>>;

    /// Stat a logical path. `Ok(None)` means the path does not exist, which
    /// is not an error.
    async fn get_file_info(&self, worker: usize, path: &str) -> StorageResult<Option<FileInfo>>;

    /// Upload `content` to `path`. On return the file is durable; whether
    /// it is already visible depends on `is_strong_consistent`.
    async fn upload_file(&self, worker: usize, path: &str, content: &[u8]) -> StorageResult<()>;

    /// Read the remote file at `path` into the chunk's buffer.
    async fn download_file(&self, worker: usize, path: &str, chunk: &mut Chunk)
        -> StorageResult<()>;

    /// Rename `from` to `to`. Atomic where `is_move_file_implemented`
    /// reports support; the fossil collector depends on that.
    async fn move_file(&self, worker: usize, from: &str, to: &str) -> StorageResult<()>;

    /// Delete `path`. Deleting a missing file is not an error.
    async fn delete_file(&self, worker: usize, path: &str) -> StorageResult<()>;

    /// Create a directory; a no-op on flat stores.
    async fn create_directory(&self, worker: usize, dir: &str) -> StorageResult<()>;

    /// Locate a chunk by id, optionally in its fossil form.
    async fn find_chunk(
        &self,
        worker: usize,
        chunk_id: &str,
        is_fossil: bool,
    ) -> StorageResult<Option<FoundChunk>> {
        let path = chunk_path(chunk_id, is_fossil);
        Ok(self
            .get_file_info(worker, &path)
            .await?
            .map(|info| FoundChunk {
                size: info.size,
                path,
            }))
    }

    /// Whether the dedup layer should keep a local snapshot cache to avoid
    /// re-downloading metadata.
    fn is_cache_needed(&self) -> bool;

    /// Whether `move_file` is supported natively.
    fn is_move_file_implemented(&self) -> bool;

    /// Whether uploads are immediately visible to lists and stats.
    fn is_strong_consistent(&self) -> bool;

    /// Whether listing the whole chunk namespace is cheap.
    fn is_fast_listing(&self) -> bool;
}
