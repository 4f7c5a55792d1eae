use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::chunk_backend::ChunkBackend;
use crate::api::log_file::LogFile;
use crate::errors::OutOfMemory;
use crate::errors::ShmError;
use crate::shm::HeapBackend;
use crate::shm::ShmChunk;
use crate::shm::SHM_CHUNK_SIZE;
use crate::types::Page;
use crate::types::SyncPolicy;

/// An in-memory [`LogFile`]; clones share the same bytes.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemFile {
    data: Arc<Mutex<Vec<u8>>>,
}

impl MemFile {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bytes(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    /// Flip every bit of the byte at `offset`.
    pub(crate) fn damage(&self, offset: u64) {
        self.data.lock()[offset as usize] ^= 0xff;
    }
}

impl LogFile for MemFile {
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), io::Error> {
        let mut d = self.data.lock();
        let end = offset as usize + buf.len();
        if d.len() < end {
            d.resize(end, 0);
        }
        d[offset as usize..end].copy_from_slice(buf);
        Ok(())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), io::Error> {
        let d = self.data.lock();
        let end = offset as usize + buf.len();
        if d.len() < end {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read [{}, {}) beyond size {}", offset, end, d.len()),
            ));
        }
        buf.copy_from_slice(&d[offset as usize..end]);
        Ok(())
    }

    fn sync(&mut self, _policy: SyncPolicy) -> Result<(), io::Error> {
        Ok(())
    }

    fn size(&self) -> Result<u64, io::Error> {
        Ok(self.data.lock().len() as u64)
    }

    fn truncate(&mut self, size: u64) -> Result<(), io::Error> {
        self.data.lock().resize(size as usize, 0);
        Ok(())
    }
}

/// Faults to inject into a [`FaultyFile`], shared with the test that arms
/// them.
#[derive(Debug, Default)]
pub(crate) struct Faults {
    /// Fail the write with this 1-based sequence number; 0 for never.
    fail_write_at: AtomicU64,
    writes: AtomicU64,
    fail_sync: AtomicBool,
    fail_truncate: AtomicBool,
}

impl Faults {
    /// Make the `n`-th write from now on fail.
    pub(crate) fn fail_nth_write(&self, n: u64) {
        let done = self.writes.load(Ordering::SeqCst);
        self.fail_write_at.store(done + n, Ordering::SeqCst);
    }

    pub(crate) fn fail_sync(&self, yes: bool) {
        self.fail_sync.store(yes, Ordering::SeqCst);
    }

    pub(crate) fn fail_truncate(&self, yes: bool) {
        self.fail_truncate.store(yes, Ordering::SeqCst);
    }

    pub(crate) fn clear(&self) {
        self.fail_write_at.store(0, Ordering::SeqCst);
        self.fail_sync(false);
        self.fail_truncate(false);
    }
}

/// Wraps a [`LogFile`] and fails operations on demand.
#[derive(Debug)]
pub(crate) struct FaultyFile<F> {
    inner: F,
    faults: Arc<Faults>,
}

impl<F> FaultyFile<F> {
    pub(crate) fn new(inner: F) -> (Self, Arc<Faults>) {
        let faults = Arc::new(Faults::default());
        let f = Self {
            inner,
            faults: faults.clone(),
        };
        (f, faults)
    }
}

fn injected(what: &str) -> io::Error {
    io::Error::other(format!("injected {} failure", what))
}

impl<F> LogFile for FaultyFile<F>
where F: LogFile
{
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), io::Error> {
        let n = self.faults.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.faults.fail_write_at.load(Ordering::SeqCst) == n {
            return Err(injected("write"));
        }
        self.inner.write_at(offset, buf)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), io::Error> {
        self.inner.read_at(offset, buf)
    }

    fn sync(&mut self, policy: SyncPolicy) -> Result<(), io::Error> {
        if self.faults.fail_sync.load(Ordering::SeqCst) {
            return Err(injected("sync"));
        }
        self.inner.sync(policy)
    }

    fn size(&self) -> Result<u64, io::Error> {
        self.inner.size()
    }

    fn truncate(&mut self, size: u64) -> Result<(), io::Error> {
        if self.faults.fail_truncate.load(Ordering::SeqCst) {
            return Err(injected("truncate"));
        }
        self.inner.truncate(size)
    }
}

/// Heap backend that runs out of memory after a number of allocations.
#[derive(Debug)]
pub(crate) struct LimitedBackend {
    remaining: Arc<AtomicUsize>,
}

impl LimitedBackend {
    /// Returns the backend and a handle to raise its allowance later.
    pub(crate) fn new(allowed: usize) -> (Self, Arc<AtomicUsize>) {
        let remaining = Arc::new(AtomicUsize::new(allowed));
        let b = Self {
            remaining: remaining.clone(),
        };
        (b, remaining)
    }
}

impl ChunkBackend for LimitedBackend {
    fn allocate_chunk(&self, index: usize) -> Result<ShmChunk, ShmError> {
        let left = self.remaining.load(Ordering::SeqCst);
        if left == 0 {
            return Err(OutOfMemory::new(index, SHM_CHUNK_SIZE).into());
        }
        self.remaining.store(left - 1, Ordering::SeqCst);
        HeapBackend.allocate_chunk(index)
    }
}

/// A page of `page_size` bytes filled with a pattern derived from `page_no`
/// and `version`.
pub(crate) fn page(page_no: u32, version: u8, page_size: u32) -> Page {
    let data = (0..page_size)
        .map(|i| (i as u8).wrapping_mul(31) ^ (page_no as u8) ^ version)
        .collect::<Vec<_>>();
    Page::new(page_no, data)
}

/// A page of random bytes.
pub(crate) fn random_page(page_no: u32, page_size: u32) -> Page {
    let data = (0..page_size).map(|_| rand::random::<u8>()).collect::<Vec<_>>();
    Page::new(page_no, data)
}
