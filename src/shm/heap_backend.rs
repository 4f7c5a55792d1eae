use crate::api::chunk_backend::ChunkBackend;
use crate::errors::OutOfMemory;
use crate::errors::ShmError;
use crate::shm::ShmChunk;
use crate::shm::SHM_CHUNK_SIZE;

/// Allocates zeroed chunks from the process heap.
///
/// Backs single-process databases and the private chunks of read-only
/// snapshot connections. The only possible failure is `OutOfMemory`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapBackend;

impl ChunkBackend for HeapBackend {
    fn allocate_chunk(&self, index: usize) -> Result<ShmChunk, ShmError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(SHM_CHUNK_SIZE)
            .map_err(|_| OutOfMemory::new(index, SHM_CHUNK_SIZE))?;
        buf.resize(SHM_CHUNK_SIZE, 0u8);

        Ok(ShmChunk::heap(index, buf.into_boxed_slice()))
    }
}
