mod shm_errors;

use std::io;

pub use shm_errors::OutOfMemory;
pub use shm_errors::ShmError;

/// Errors returned by the WAL writer and readers.
///
/// `OutOfMemory`, `Io` and `Busy` are retryable by an external driver;
/// `Corrupt` is fatal for the connection that observed it.
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum WalError {
    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemory),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Corrupt(#[from] Corrupt),

    #[error(transparent)]
    Busy(#[from] Busy),

    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
}

impl WalError {
    /// Whether the operation may succeed if the caller retries it later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalError::OutOfMemory(_) | WalError::Io(_) | WalError::Busy(_)
        )
    }

    /// Whether the error leaves the connection unusable until it is
    /// reopened.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WalError::Corrupt(_))
    }
}

impl From<ShmError> for WalError {
    fn from(value: ShmError) -> Self {
        match value {
            ShmError::OutOfMemory(e) => WalError::OutOfMemory(e),
            ShmError::Io(e) => WalError::Io(e),
        }
    }
}

impl From<WalError> for io::Error {
    fn from(value: WalError) -> Self {
        match value {
            WalError::OutOfMemory(e) => {
                io::Error::new(io::ErrorKind::OutOfMemory, e.to_string())
            }
            WalError::Io(e) => e,
            WalError::Corrupt(e) => {
                io::Error::new(io::ErrorKind::InvalidData, e.to_string())
            }
            WalError::Busy(e) => {
                io::Error::new(io::ErrorKind::WouldBlock, e.to_string())
            }
            WalError::InvalidInput(e) => {
                io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
            }
        }
    }
}

/// A checksum or header self-check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("WAL corrupted: {reason}")]
pub struct Corrupt {
    pub reason: String,
}

impl Corrupt {
    pub fn new(reason: impl ToString) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

/// A lock needed by the operation is held by someone else.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("WAL busy: {reason}")]
pub struct Busy {
    pub reason: String,
}

impl Busy {
    pub fn new(reason: impl ToString) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

/// The caller passed arguments the WAL cannot accept.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(thiserror::Error)]
#[error("invalid input: {reason}")]
pub struct InvalidInput {
    pub reason: String,
}

impl InvalidInput {
    pub fn new(reason: impl ToString) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::Busy;
    use super::Corrupt;
    use super::InvalidInput;
    use super::OutOfMemory;
    use super::ShmError;
    use super::WalError;

    #[test]
    fn test_classify() {
        let oom = WalError::from(ShmError::from(OutOfMemory::new(3, 32768)));
        assert!(matches!(oom, WalError::OutOfMemory(_)));
        assert!(oom.is_retryable());
        assert!(!oom.is_fatal());

        let io_err = WalError::from(io::Error::other("disk gone"));
        assert!(io_err.is_retryable());
        assert!(!io_err.is_fatal());

        let busy = WalError::from(Busy::new("writer lock"));
        assert!(busy.is_retryable());

        let corrupt = WalError::from(Corrupt::new("bad checksum"));
        assert!(!corrupt.is_retryable());
        assert!(corrupt.is_fatal());

        let invalid = WalError::from(InvalidInput::new("empty batch"));
        assert!(!invalid.is_retryable());
        assert!(!invalid.is_fatal());
    }

    #[test]
    fn test_into_io_error() {
        let e: io::Error = WalError::from(Corrupt::new("x")).into();
        assert_eq!(io::ErrorKind::InvalidData, e.kind());
        assert_eq!("WAL corrupted: x", e.to_string());

        let e: io::Error = WalError::from(Busy::new("y")).into();
        assert_eq!(io::ErrorKind::WouldBlock, e.kind());

        let e: io::Error =
            WalError::from(OutOfMemory::new(1, 2)).into();
        assert_eq!(io::ErrorKind::OutOfMemory, e.kind());
    }
}
