//! barrow-storage: the uniform contract over remote object stores.
//!
//! The dedup layer needs only a handful of primitives — list, stat, upload,
//! download, move, delete — plus four capability flags telling it how much
//! it can trust the backend (consistency, atomic rename, listing speed,
//! whether a local snapshot cache is worth keeping). Everything else about a
//! provider stays behind its adapter.
//!
//! Two adapters ship here: [`MemoryBackend`], the strongly consistent
//! exemplar the contract tests run against, and [`RenterBackend`], the
//! reference adapter for an asynchronous renter-style remote that stages
//! transfers through local temp files and polls for completion.

pub mod backend;
pub mod error;
pub mod layout;
pub mod memory;
pub mod renter;
pub mod waiter;

pub use backend::{
    chunk_path, snapshot_path, FileEntry, FileInfo, FoundChunk, StorageBackend,
};
pub use error::{StorageError, StorageResult};
pub use layout::StorageLayout;
pub use memory::MemoryBackend;
pub use renter::{RenterApi, RenterBackend, RenterDownload, RenterFile};
pub use waiter::{Backoff, PollInterval, Waiter};
