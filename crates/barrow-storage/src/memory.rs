//! In-memory storage backend.
//!
//! The contract exemplar: strongly consistent, atomic rename, instant
//! listing. The dedup layer's tests run against it, and it doubles as the
//! simplest reference for new adapters.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use async_trait::async_trait;
use parking_lot::Mutex;

use barrow_chunk::Chunk;

use crate::backend::{FileEntry, FileInfo, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::layout::StorageLayout;

pub struct MemoryBackend {
    layout: StorageLayout,
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new(storage_dir: &str) -> Self {
        Self {
            layout: StorageLayout::new(storage_dir),
            files: Mutex::new(BTreeMap::new()),
        }
    }

    /// The layout, for configuring shard nesting before use.
    pub fn layout_mut(&mut self) -> &mut StorageLayout {
        &mut self.layout
    }

    /// Number of stored files.
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    fn find_physical(&self, files: &BTreeMap<String, Vec<u8>>, path: &str) -> Option<String> {
        self.layout
            .read_paths(path)
            .into_iter()
            .find(|candidate| files.contains_key(candidate))
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list_files(&self, _worker: usize, dir: &str) -> StorageResult<Vec<FileEntry>> {
        let mut dir = dir.to_string();
        if !dir.is_empty() && !dir.ends_with('/') {
            dir.push('/');
        }
        let prefix = self.layout.full_path(&dir);

        let files = self.files.lock();
        let mut entries = Vec::new();
        let mut seen_dirs = BTreeSet::new();
        for (path, content) in files.range(prefix.clone()..) {
            if !path.starts_with(&prefix) {
                break;
            }
            let rest = &path[prefix.len()..];
            match rest.split_once('/') {
                Some((subdir, _)) => {
                    if seen_dirs.insert(subdir.to_string()) {
                        entries.push(FileEntry {
                            name: format!("{subdir}/"),
                            size: 0,
                        });
                    }
                }
                None => entries.push(FileEntry {
                    name: rest.to_string(),
                    size: content.len() as u64,
                }),
            }
        }
        Ok(entries)
    }

    async fn get_file_info(&self, _worker: usize, path: &str) -> StorageResult<Option<FileInfo>> {
        let files = self.files.lock();
        if let Some(physical) = self.find_physical(&files, path) {
            let size = files[&physical].len() as u64;
            return Ok(Some(FileInfo {
                is_dir: false,
                size,
            }));
        }

        let dir_prefix = format!("{}/", self.layout.full_path(path.trim_end_matches('/')));
        let is_dir = files
            .range(dir_prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&dir_prefix));
        Ok(is_dir.then_some(FileInfo {
            is_dir: true,
            size: 0,
        }))
    }

    async fn upload_file(&self, _worker: usize, path: &str, content: &[u8]) -> StorageResult<()> {
        self.files
            .lock()
            .insert(self.layout.full_path(path), content.to_vec());
        Ok(())
    }

    async fn download_file(
        &self,
        _worker: usize,
        path: &str,
        chunk: &mut Chunk,
    ) -> StorageResult<()> {
        let files = self.files.lock();
        let physical = self
            .find_physical(&files, path)
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_string(),
            })?;
        chunk.write_all(&files[&physical])?;
        Ok(())
    }

    async fn move_file(&self, _worker: usize, from: &str, to: &str) -> StorageResult<()> {
        let mut files = self.files.lock();
        let source = self
            .find_physical(&files, from)
            .ok_or_else(|| StorageError::NotFound {
                path: from.to_string(),
            })?;
        let content = files.remove(&source).unwrap_or_default();
        files.insert(self.layout.full_path(to), content);
        Ok(())
    }

    async fn delete_file(&self, _worker: usize, path: &str) -> StorageResult<()> {
        let mut files = self.files.lock();
        if let Some(physical) = self.find_physical(&files, path) {
            files.remove(&physical);
        }
        Ok(())
    }

    async fn create_directory(&self, _worker: usize, _dir: &str) -> StorageResult<()> {
        Ok(())
    }

    fn is_cache_needed(&self) -> bool {
        false
    }

    fn is_move_file_implemented(&self) -> bool {
        true
    }

    fn is_strong_consistent(&self) -> bool {
        true
    }

    fn is_fast_listing(&self) -> bool {
        true
    }
}
