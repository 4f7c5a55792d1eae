use std::fmt::Debug;

use crate::errors::ShmError;
use crate::shm::ShmChunk;

/// Source of new shared-memory chunks.
///
/// A backend is chosen once, when a database or a read-only connection is
/// opened, and is asked for each chunk index at most once per owner.
pub trait ChunkBackend: Debug + Send + Sync {
    /// Create chunk `index`: `SHM_CHUNK_SIZE` bytes, zeroed unless another
    /// process already wrote to the same region.
    fn allocate_chunk(&self, index: usize) -> Result<ShmChunk, ShmError>;
}
