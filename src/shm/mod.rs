//! Shared-memory chunk cache backing the WAL index.
//!
//! Shared memory is handed out in fixed-size chunks identified by their
//! index. A [`ShmDatabase`] owns the ordered, append-only array of chunks
//! published for one database; each [`ShmConnection`] keeps its own array of
//! handles and grows it on demand with [`ShmConnection::ensure_chunks`].
//!
//! A published chunk is never resized, moved or freed while the database is
//! open, so a connection can keep reading through its handles without
//! touching the database lock again.

pub(crate) mod chunk;
pub(crate) mod connection;
pub(crate) mod database;
pub(crate) mod heap_backend;
pub(crate) mod mapped_backend;

use std::fmt;

pub use chunk::ShmChunk;
pub use connection::ShmConnection;
pub use database::ShmDatabase;
pub use database::ShmStat;
pub use heap_backend::HeapBackend;
pub use mapped_backend::MappedBackend;

/// Size in bytes of every shared-memory chunk.
pub const SHM_CHUNK_SIZE: usize = 32 * 1024;

/// How a connection sources its chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShmMode {
    /// Chunks are process-local heap buffers shared by the connections of
    /// one process.
    SingleProcess,

    /// Chunks are mapped from the `-shm` file and shared with other
    /// processes.
    MultiProcess,

    /// Chunks are private heap buffers of one connection, never aliasing
    /// the database's chunks.
    ReadOnlySnapshot,
}

/// How a database shares its chunks: the two modes a [`ShmDatabase`] can
/// be opened in. A read-only snapshot is a property of a connection only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseMode {
    SingleProcess,
    MultiProcess,
}

impl From<DatabaseMode> for ShmMode {
    fn from(m: DatabaseMode) -> Self {
        match m {
            DatabaseMode::SingleProcess => ShmMode::SingleProcess,
            DatabaseMode::MultiProcess => ShmMode::MultiProcess,
        }
    }
}

impl fmt::Display for ShmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShmMode::SingleProcess => write!(f, "single-process"),
            ShmMode::MultiProcess => write!(f, "multi-process"),
            ShmMode::ReadOnlySnapshot => write!(f, "read-only-snapshot"),
        }
    }
}
