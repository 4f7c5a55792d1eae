use std::fmt;
use std::sync::Arc;

use byteorder::ByteOrder;
use byteorder::NativeEndian;
use memmap2::MmapMut;
use parking_lot::Mutex;

use crate::shm::SHM_CHUNK_SIZE;

enum ChunkMem {
    Heap(Box<[u8]>),
    Mapped(MmapMut),
}

impl ChunkMem {
    fn bytes(&self) -> &[u8] {
        match self {
            ChunkMem::Heap(b) => &b[..],
            ChunkMem::Mapped(m) => &m[..],
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            ChunkMem::Heap(b) => &mut b[..],
            ChunkMem::Mapped(m) => &mut m[..],
        }
    }
}

/// Handle to one shared-memory chunk.
///
/// Cloning a handle does not copy the chunk: all clones refer to the same
/// memory, which stays at the same address for as long as any handle is
/// alive. Integers are stored in native byte order; shared memory is never
/// moved between hosts.
#[derive(Clone)]
pub struct ShmChunk {
    index: usize,
    mem: Arc<Mutex<ChunkMem>>,
}

impl fmt::Debug for ShmChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &*self.mem.lock() {
            ChunkMem::Heap(_) => "heap",
            ChunkMem::Mapped(_) => "mapped",
        };
        write!(
            f,
            "ShmChunk{{index: {}, {}@{:p}}}",
            self.index,
            kind,
            Arc::as_ptr(&self.mem)
        )
    }
}

impl ShmChunk {
    pub(crate) fn heap(index: usize, buf: Box<[u8]>) -> Self {
        debug_assert_eq!(buf.len(), SHM_CHUNK_SIZE);
        Self {
            index,
            mem: Arc::new(Mutex::new(ChunkMem::Heap(buf))),
        }
    }

    pub(crate) fn mapped(index: usize, mmap: MmapMut) -> Self {
        debug_assert_eq!(mmap.len(), SHM_CHUNK_SIZE);
        Self {
            index,
            mem: Arc::new(Mutex::new(ChunkMem::Mapped(mmap))),
        }
    }

    /// Position of this chunk in the database-wide chunk sequence.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        SHM_CHUNK_SIZE
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether two handles refer to the same chunk memory.
    pub fn ptr_eq(a: &ShmChunk, b: &ShmChunk) -> bool {
        Arc::ptr_eq(&a.mem, &b.mem)
    }

    /// Run `f` on the chunk bytes while holding the chunk lock.
    pub fn with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let mem = self.mem.lock();
        f(mem.bytes())
    }

    /// Run `f` on the mutable chunk bytes while holding the chunk lock.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut mem = self.mem.lock();
        f(mem.bytes_mut())
    }

    /// # Panics
    ///
    /// Panics if `offset + 4 > SHM_CHUNK_SIZE`.
    pub fn read_u32(&self, offset: usize) -> u32 {
        self.with(|b| NativeEndian::read_u32(&b[offset..offset + 4]))
    }

    /// # Panics
    ///
    /// Panics if `offset + 4 > SHM_CHUNK_SIZE`.
    pub fn write_u32(&self, offset: usize, v: u32) {
        self.with_mut(|b| NativeEndian::write_u32(&mut b[offset..offset + 4], v))
    }

    pub fn is_zeroed(&self) -> bool {
        self.with(|b| b.iter().all(|x| *x == 0))
    }
}

#[cfg(test)]
mod tests {
    use super::ShmChunk;
    use crate::shm::SHM_CHUNK_SIZE;

    fn zeroed(index: usize) -> ShmChunk {
        ShmChunk::heap(index, vec![0; SHM_CHUNK_SIZE].into_boxed_slice())
    }

    #[test]
    fn test_clone_shares_memory() {
        let a = zeroed(2);
        let b = a.clone();

        assert!(ShmChunk::ptr_eq(&a, &b));
        assert_eq!(2, b.index());

        a.write_u32(8, 0xdead_beef);
        assert_eq!(0xdead_beef, b.read_u32(8));
        assert!(!b.is_zeroed());
    }

    #[test]
    fn test_distinct_chunks() {
        let a = zeroed(0);
        let b = zeroed(0);

        assert!(!ShmChunk::ptr_eq(&a, &b));
        assert!(a.is_zeroed());
        assert_eq!(SHM_CHUNK_SIZE, a.len());
    }

    #[test]
    fn test_with_mut() {
        let a = zeroed(0);
        a.with_mut(|b| b[SHM_CHUNK_SIZE - 1] = 7);

        assert_eq!(7, a.with(|b| b[SHM_CHUNK_SIZE - 1]));
    }
}
