//! Durable state on the local filesystem.
//!
//! - [`ChunkStorage`]: the raw-storage collaborator holding each document's chunks
//! - [`DocumentRegistry`]: the orchestrator's record of what it created per document
//! - [`write_atomic`]: temp-file + rename used by every writer in the crate

pub mod chunks;
pub mod error;
pub mod registry;

pub use chunks::{ChunkStorage, FileChunkStorage};
pub use error::{StorageError, StorageResult};
pub use registry::DocumentRegistry;

use std::io::Write;
use std::path::Path;

/// Replace `path` with `bytes` so readers see either the old or the new file.
///
/// The temp file lives in the destination directory because rename is only
/// atomic within one filesystem.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
