use std::io;

/// Heap or mapping space for a shared-memory chunk could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("out of memory allocating {size} bytes for shm chunk {index}")]
pub struct OutOfMemory {
    pub index: usize,
    pub size: usize,
}

impl OutOfMemory {
    pub fn new(index: usize, size: usize) -> Self {
        Self { index, size }
    }
}

/// Failure to make a shared-memory chunk available.
///
/// Chunks published before the failure stay published; retrying the same
/// call reuses them.
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum ShmError {
    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemory),

    #[error("shm I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<ShmError> for io::Error {
    fn from(value: ShmError) -> Self {
        match value {
            ShmError::OutOfMemory(e) => {
                io::Error::new(io::ErrorKind::OutOfMemory, e.to_string())
            }
            ShmError::Io(e) => e,
        }
    }
}
