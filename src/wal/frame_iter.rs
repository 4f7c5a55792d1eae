use codeq::error_context_ext::ErrorContextExt;
use codeq::Decode;

use crate::api::log_file::LogFile;
use crate::errors::Corrupt;
use crate::errors::WalError;
use crate::types::Segment;
use crate::wal::checksum::WalChecksum;
use crate::wal::frame::FrameHeader;
use crate::wal::frame_offset;
use crate::wal::wal_header::WalHeader;

/// A frame found in the WAL file whose salts and checksum chain are valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEntry {
    /// Position of the frame, counted from 1.
    pub frame_no: u32,

    /// Byte range of the frame, header included, in the WAL file.
    pub segment: Segment,

    pub header: FrameHeader,
}

/// Iterates the frames following a WAL header, verifying the chain.
///
/// Yields an error for the first frame that is short or does not continue
/// the chain, then stops.
pub(crate) struct FrameIter<'a, F: ?Sized> {
    file: &'a F,
    wal_header: WalHeader,
    file_size: u64,

    /// Number of frames yielded so far.
    frame_no: u32,
    checksum: WalChecksum,
    buf: Vec<u8>,

    failed: bool,
}

impl<'a, F> FrameIter<'a, F>
where F: LogFile + ?Sized
{
    pub(crate) fn new(
        file: &'a F,
        wal_header: WalHeader,
        file_size: u64,
    ) -> Self {
        Self {
            file,
            wal_header,
            file_size,
            frame_no: 0,
            checksum: wal_header.checksum,
            buf: Vec::new(),
            failed: false,
        }
    }

    fn read_frame(&mut self) -> Result<Option<FrameEntry>, WalError> {
        let page_size = self.wal_header.page_size;
        let frame_no = self.frame_no + 1;
        let offset = frame_offset(frame_no, page_size);
        let frame_size = self.wal_header.frame_size();

        if offset == self.file_size {
            return Ok(None);
        }

        if offset + frame_size > self.file_size {
            return Err(Corrupt::new(format!(
                "short frame {} at offset {}: {} bytes left, need {}",
                frame_no,
                offset,
                self.file_size.saturating_sub(offset),
                frame_size
            ))
            .into());
        }

        self.buf.resize(frame_size as usize, 0);
        self.file
            .read_at(offset, &mut self.buf)
            .context(|| format!("read frame {} at offset {}", frame_no, offset))?;

        let header = FrameHeader::decode(&self.buf[..FrameHeader::SIZE])?;

        let checksum = header
            .verify(
                self.wal_header.salts,
                self.checksum,
                &self.buf[FrameHeader::SIZE..],
                self.wal_header.big_endian(),
            )
            .map_err(|e| {
                Corrupt::new(format!(
                    "frame {} at offset {}: {}",
                    frame_no, offset, e.reason
                ))
            })?;

        self.frame_no = frame_no;
        self.checksum = checksum;

        Ok(Some(FrameEntry {
            frame_no,
            segment: Segment::new(offset, frame_size),
            header,
        }))
    }
}

impl<F> Iterator for FrameIter<'_, F>
where F: LogFile + ?Sized
{
    type Item = Result<FrameEntry, WalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let res = self.read_frame();
        if res.is_err() {
            self.failed = true;
        }

        res.transpose()
    }
}
