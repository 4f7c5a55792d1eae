use std::sync::Arc;

use log::debug;

use crate::api::chunk_backend::ChunkBackend;
use crate::errors::ShmError;
use crate::shm::HeapBackend;
use crate::shm::ShmChunk;
use crate::shm::ShmDatabase;
use crate::shm::ShmMode;

/// One caller's view of the shared-memory chunks of a database.
///
/// Holds handles to chunks `[0, n)`: `apShm` and `nShm`. In shared modes the
/// handles refer to the database's chunks; in [`ShmMode::ReadOnlySnapshot`]
/// they refer to private copies nobody else can write to.
#[derive(Debug)]
pub struct ShmConnection {
    mode: ShmMode,
    db: Arc<ShmDatabase>,
    chunks: Vec<ShmChunk>,
}

impl ShmConnection {
    /// Attaches a connection that shares the database's chunks.
    pub fn shared(db: Arc<ShmDatabase>) -> Self {
        Self {
            mode: db.mode(),
            db,
            chunks: Vec::new(),
        }
    }

    /// Attaches a connection whose chunks are private heap buffers.
    pub fn read_only_snapshot(db: Arc<ShmDatabase>) -> Self {
        Self {
            mode: ShmMode::ReadOnlySnapshot,
            db,
            chunks: Vec::new(),
        }
    }

    pub fn mode(&self) -> ShmMode {
        self.mode
    }

    pub fn database(&self) -> &Arc<ShmDatabase> {
        &self.db
    }

    /// Number of chunks this connection can address: `nShm`.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Returns the chunk at `index`, if this connection already holds it.
    pub fn chunk(&self, index: usize) -> Option<&ShmChunk> {
        self.chunks.get(index)
    }

    pub fn chunks(&self) -> &[ShmChunk] {
        &self.chunks
    }

    /// Make sure chunks `[0, n)` are available to this connection.
    ///
    /// A no-op if the connection already holds `n` chunks. Otherwise the
    /// missing chunks are obtained from the database (shared modes) or
    /// freshly allocated (read-only snapshot), and the connection grows to
    /// `n` only when all of them are in hand. On error the connection is
    /// left unchanged.
    pub fn ensure_chunks(&mut self, n: usize) -> Result<(), ShmError> {
        let have = self.chunks.len();
        if n <= have {
            return Ok(());
        }

        let fresh = match self.mode {
            ShmMode::ReadOnlySnapshot => (have..n)
                .map(|index| HeapBackend.allocate_chunk(index))
                .collect::<Result<Vec<_>, _>>()?,
            ShmMode::SingleProcess | ShmMode::MultiProcess => {
                self.db.acquire_range(have, n)?
            }
        };

        self.chunks.extend(fresh);

        debug!(
            "Connection({}) holds {} shm chunks, was {}",
            self.mode, n, have
        );
        Ok(())
    }
}
