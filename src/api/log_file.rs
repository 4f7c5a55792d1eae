use std::io;

use crate::types::SyncPolicy;

/// Synchronous file primitives the WAL writer and readers are built on.
///
/// Appending a frame is a `write_at` at the writer's tail offset: after a
/// failed batch the writer rewinds to the commit boundary and overwrites the
/// discarded frames.
pub trait LogFile: Send {
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), io::Error>;

    /// Fill `buf` with the bytes at `offset`.
    ///
    /// Returns an `UnexpectedEof` error if the file ends before `buf` is
    /// full.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), io::Error>;

    fn sync(&mut self, policy: SyncPolicy) -> Result<(), io::Error>;

    fn size(&self) -> Result<u64, io::Error>;

    fn truncate(&mut self, size: u64) -> Result<(), io::Error>;
}
