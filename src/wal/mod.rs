//! The write-ahead log: frame encoding, checksum chaining, the commit
//! protocol and the index kept in shared memory.
//!
//! A WAL file is a [`WalHeader`] followed by frames. Frame `n`, counted from
//! 1, starts at `32 + (n - 1) * (24 + page_size)`.

pub(crate) mod checksum;
pub(crate) mod commit_state;
pub(crate) mod dump;
pub(crate) mod frame;
pub(crate) mod frame_iter;
pub(crate) mod frame_writer;
pub(crate) mod reader;
pub(crate) mod recovery;
pub(crate) mod stat;
#[allow(clippy::module_inception)]
pub(crate) mod wal;
pub(crate) mod wal_header;
pub(crate) mod wal_index;

use frame::FrameHeader;
use wal_header::WalHeader;

/// Size in bytes of a WAL holding `frames` frames of `page_size` bytes.
pub(crate) fn wal_size(frames: u32, page_size: u32) -> u64 {
    WalHeader::SIZE as u64
        + frames as u64 * (FrameHeader::SIZE as u64 + page_size as u64)
}

/// Byte offset of frame `frame_no`, counted from 1.
pub(crate) fn frame_offset(frame_no: u32, page_size: u32) -> u64 {
    debug_assert!(frame_no > 0);
    wal_size(frame_no - 1, page_size)
}

#[cfg(test)]
mod tests {
    use super::frame_offset;
    use super::wal_size;

    #[test]
    fn test_frame_offsets() {
        assert_eq!(32, wal_size(0, 4096));
        assert_eq!(32, frame_offset(1, 4096));
        assert_eq!(32 + 4120, frame_offset(2, 4096));
        assert_eq!(32 + 3 * 536, wal_size(3, 512));
        assert_eq!(
            32 + (u32::MAX as u64) * (24 + 65536),
            wal_size(u32::MAX, 65536)
        );
    }
}
