use std::fs::File;
use std::fs::OpenOptions;
use std::io;

use codeq::error_context_ext::ErrorContextExt;
use fs2::FileExt;
use log::debug;
use log::info;
use memmap2::MmapOptions;

use crate::api::chunk_backend::ChunkBackend;
use crate::errors::ShmError;
use crate::shm::ShmChunk;
use crate::shm::SHM_CHUNK_SIZE;

/// Maps chunks of the `-shm` file so that every process opening the same
/// database sees the same memory.
///
/// The file holds a shared lock for as long as this backend lives. The
/// first opener, the one that can take the lock exclusively, truncates
/// whatever a previous session left behind.
#[derive(Debug)]
pub struct MappedBackend {
    path: String,
    f: File,
}

impl MappedBackend {
    pub fn open(path: impl ToString) -> Result<Self, io::Error> {
        let path = path.to_string();

        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .context(|| format!("open shm file '{}'", path))?;

        if f.try_lock_exclusive().is_ok() {
            f.set_len(0)
                .context(|| format!("reset stale shm file '{}'", path))?;
            info!("First opener of shm file, stale content reset: {}", path);
        }

        // Converts the exclusive lock, if any, into a shared one.
        FileExt::lock_shared(&f)
            .context(|| format!("lock shm file '{}' shared", path))?;

        Ok(Self { path, f })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ChunkBackend for MappedBackend {
    fn allocate_chunk(&self, index: usize) -> Result<ShmChunk, ShmError> {
        let offset = (index * SHM_CHUNK_SIZE) as u64;
        let end = offset + SHM_CHUNK_SIZE as u64;

        // Grow-only: another process extending the file concurrently can
        // never shrink it below `end`.
        self.f.allocate(end).context(|| {
            format!("extend shm file '{}' to {} bytes", self.path, end)
        })?;

        // SAFETY: the region lies within the file, which is never truncated
        // while a shared lock is held on it. Concurrent writes by other
        // processes only change bytes, never the mapping itself.
        let mmap = unsafe {
            MmapOptions::new()
                .offset(offset)
                .len(SHM_CHUNK_SIZE)
                .map_mut(&self.f)
        }
        .context(|| format!("map chunk {} of '{}'", index, self.path))?;

        debug!("Mapped shm chunk {} of '{}'", index, self.path);

        Ok(ShmChunk::mapped(index, mmap))
    }
}

impl Drop for MappedBackend {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.f);
        info!("Shm file lock released: {}", self.path);
    }
}
