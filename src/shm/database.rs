use std::fmt;
use std::fmt::Formatter;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::debug;
use log::info;
use parking_lot::Mutex;

use crate::api::chunk_backend::ChunkBackend;
use crate::errors::ShmError;
use crate::num::format_pad9_u64;
use crate::shm::DatabaseMode;
use crate::shm::HeapBackend;
use crate::shm::MappedBackend;
use crate::shm::ShmChunk;
use crate::shm::ShmMode;
use crate::Config;

/// Shared-memory state of one open database, shared by all its connections
/// in this process.
///
/// `chunks` is an append-only arena: an index, once published, keeps
/// referring to the same chunk until the database is dropped. Growth is
/// serialized by the mutex; the number of published chunks can be read
/// without it.
#[derive(Debug)]
pub struct ShmDatabase {
    mode: ShmMode,

    backend: Box<dyn ChunkBackend>,

    chunks: Mutex<Vec<ShmChunk>>,

    /// Number of chunks ever published, stored after the chunk is pushed.
    n_chunks: AtomicUsize,

    backend_allocations: AtomicU64,
}

impl ShmDatabase {
    /// Opens the shared-memory state for the database described by
    /// `config`.
    ///
    /// With `multi_process` enabled, chunks are mapped from
    /// [`Config::shm_path`]; otherwise they are heap buffers.
    pub fn open(config: &Config) -> Result<Arc<Self>, ShmError> {
        let db = if config.multi_process() {
            let backend = MappedBackend::open(config.shm_path())?;
            Self::with_backend(DatabaseMode::MultiProcess, Box::new(backend))
        } else {
            Self::with_backend(
                DatabaseMode::SingleProcess,
                Box::new(HeapBackend),
            )
        };

        info!("Opened {} shm for '{}'", db.mode, config.path);
        Ok(db)
    }

    /// Creates the shared state around an explicit backend.
    ///
    /// A database is never a read-only snapshot, so `mode` cannot name one:
    ///
    /// ```compile_fail
    /// use shm_wal::{HeapBackend, ShmDatabase, ShmMode};
    ///
    /// ShmDatabase::with_backend(ShmMode::ReadOnlySnapshot, Box::new(HeapBackend));
    /// ```
    pub fn with_backend(
        mode: DatabaseMode,
        backend: Box<dyn ChunkBackend>,
    ) -> Arc<Self> {
        Arc::new(Self {
            mode: mode.into(),
            backend,
            chunks: Mutex::new(Vec::new()),
            n_chunks: AtomicUsize::new(0),
            backend_allocations: AtomicU64::new(0),
        })
    }

    pub fn mode(&self) -> ShmMode {
        self.mode
    }

    /// Number of chunks published so far: `nShmChunk`.
    pub fn published_chunks(&self) -> usize {
        self.n_chunks.load(Ordering::Acquire)
    }

    /// Returns the published chunk at `index`, if any.
    pub fn chunk(&self, index: usize) -> Option<ShmChunk> {
        self.chunks.lock().get(index).cloned()
    }

    pub fn stat(&self) -> ShmStat {
        ShmStat {
            mode: self.mode,
            published_chunks: self.published_chunks() as u64,
            backend_allocations: self
                .backend_allocations
                .load(Ordering::Relaxed),
        }
    }

    /// Returns handles to chunks `[from, to)`, publishing the missing ones.
    ///
    /// Already published indices are reused, never reallocated. If the
    /// backend fails, the chunks published before the failure stay
    /// published and the error is returned.
    pub(crate) fn acquire_range(
        &self,
        from: usize,
        to: usize,
    ) -> Result<Vec<ShmChunk>, ShmError> {
        let mut chunks = self.chunks.lock();
        let mut acquired = Vec::with_capacity(to.saturating_sub(from));

        for index in from..to {
            if index >= chunks.len() {
                debug_assert_eq!(index, chunks.len());

                let chunk = self.backend.allocate_chunk(index)?;
                self.backend_allocations.fetch_add(1, Ordering::Relaxed);

                chunks.push(chunk);
                self.n_chunks.store(chunks.len(), Ordering::Release);

                debug!("Published {} shm chunk {}", self.mode, index);
            }

            acquired.push(chunks[index].clone());
        }

        Ok(acquired)
    }
}

/// Statistics about the shared-memory chunks of a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShmStat {
    pub mode: ShmMode,
    /// Number of chunks published in the database array
    pub published_chunks: u64,
    /// Number of chunks created by the backend
    pub backend_allocations: u64,
}

impl fmt::Display for ShmStat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ShmStat{{mode: {}, published_chunks: {}, backend_allocations: {}}}",
            self.mode,
            format_pad9_u64(self.published_chunks),
            format_pad9_u64(self.backend_allocations),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::shm::DatabaseMode;
    use crate::shm::HeapBackend;
    use crate::shm::ShmDatabase;
    use crate::shm::ShmMode;

    #[test]
    fn test_database_mode() {
        let single = ShmDatabase::with_backend(
            DatabaseMode::SingleProcess,
            Box::new(HeapBackend),
        );
        assert_eq!(ShmMode::SingleProcess, single.mode());

        let multi = ShmDatabase::with_backend(
            DatabaseMode::MultiProcess,
            Box::new(HeapBackend),
        );
        assert_eq!(ShmMode::MultiProcess, multi.mode());
        assert_eq!(ShmMode::MultiProcess, multi.stat().mode);
    }
}
