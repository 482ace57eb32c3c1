//! barrow-chunk: the chunk pipeline between the splitter and the storage
//! backends.
//!
//! A [`Chunk`] is a reusable byte container that accumulates plaintext,
//! tracks a keyed content hash, derives a stable printable id, and seals
//! itself into a self-describing encrypted envelope (or opens one back up on
//! restore). Buffers come from a bounded [`BufferPool`] because chunks are
//! tens of megabytes and every encrypt/decrypt swaps buffers.
//!
//! Two independent clients constructed with the same [`RepoConfig`] keys
//! assign the same id to the same plaintext, which is what makes
//! coordination-free deduplication work.

pub mod chunk;
pub mod config;
pub mod error;
pub mod pool;

pub use chunk::{Chunk, ENCRYPTION_HEADER};
pub use config::{legacy_decrypt_from_env, RepoConfig, LEGACY_DECRYPT_ENV};
pub use error::{ChunkError, ChunkResult};
pub use pool::BufferPool;
