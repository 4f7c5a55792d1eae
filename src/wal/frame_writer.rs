use std::io;

use codeq::error_context_ext::ErrorContextExt;
use codeq::Encode;
use log::debug;

use crate::api::log_file::LogFile;
use crate::errors::Corrupt;
use crate::errors::WalError;
use crate::types::Page;
use crate::types::SyncPolicy;
use crate::wal::checksum::WalChecksum;
use crate::wal::frame::FrameHeader;
use crate::wal::frame_offset;
use crate::wal::wal_header::Salts;
use crate::wal::wal_header::WalHeader;
use crate::wal::wal_index::IndexHeader;
use crate::wal::wal_index::WalIndex;
use crate::wal::wal_size;

/// Encodes frames, chains their checksums, writes them to the WAL file and
/// records them in the WAL index.
///
/// The writer position may run ahead of the last published commit: frames
/// of non-commit batches stay pending until a commit publishes them, or
/// until [`FrameWriter::reset_to`] discards them.
#[derive(Debug)]
pub(crate) struct FrameWriter<F> {
    file: F,
    index: WalIndex,

    wal_header: Option<WalHeader>,

    /// Number of frames written, pending ones included.
    frames: u32,

    /// Running checksum after the last written frame.
    checksum: WalChecksum,

    buf: Vec<u8>,
}

impl<F> FrameWriter<F>
where F: LogFile
{
    /// Creates a writer positioned right after the commit described by `at`.
    pub(crate) fn new(
        file: F,
        index: WalIndex,
        wal_header: Option<WalHeader>,
        at: &IndexHeader,
    ) -> Self {
        Self {
            file,
            index,
            wal_header,
            frames: at.mx_frame,
            checksum: at.frame_checksum,
            buf: Vec::new(),
        }
    }

    pub(crate) fn file(&self) -> &F {
        &self.file
    }

    pub(crate) fn index(&self) -> &WalIndex {
        &self.index
    }

    pub(crate) fn index_mut(&mut self) -> &mut WalIndex {
        &mut self.index
    }

    pub(crate) fn wal_header(&self) -> Option<&WalHeader> {
        self.wal_header.as_ref()
    }

    pub(crate) fn frames(&self) -> u32 {
        self.frames
    }

    pub(crate) fn checksum(&self) -> WalChecksum {
        self.checksum
    }

    /// Offset the next write goes to; 0 while the WAL has to be restarted
    /// with a new header.
    pub(crate) fn tail_offset(&self) -> u64 {
        match (self.frames, self.wal_header) {
            (0, _) | (_, None) => 0,
            (n, Some(h)) => wal_size(n, h.page_size),
        }
    }

    /// Starts a new WAL generation: writes a header with fresh salts and
    /// seeds the checksum chain with it.
    pub(crate) fn start_wal(
        &mut self,
        page_size: u32,
        big_endian: bool,
        sync: SyncPolicy,
    ) -> Result<(), WalError> {
        let checkpoint_seq = self
            .wal_header
            .map(|h| h.checkpoint_seq.wrapping_add(1))
            .unwrap_or(0);

        let h = WalHeader::new(
            page_size,
            checkpoint_seq,
            Salts::random(),
            big_endian,
        );

        self.buf.clear();
        h.encode(&mut self.buf)?;
        self.file
            .write_at(0, &self.buf)
            .context(|| "write WAL header".to_string())?;
        self.file
            .sync(sync)
            .context(|| "sync WAL header".to_string())?;

        self.wal_header = Some(h);
        self.frames = 0;
        self.checksum = h.checksum;

        debug!("Started WAL: {}, salts: {:?}", h, h.salts);
        Ok(())
    }

    /// Writes `page` as the next frame and records it in the index.
    ///
    /// `db_size` is non-zero only for the commit frame.
    pub(crate) fn append(
        &mut self,
        page: &Page,
        db_size: u32,
    ) -> Result<(), WalError> {
        let Some(wh) = self.wal_header else {
            return Err(Corrupt::new("frame written before the WAL header").into());
        };

        let frame_no = self.frames + 1;
        let header = FrameHeader::seal(
            page.page_no,
            db_size,
            wh.salts,
            self.checksum,
            &page.data,
            wh.big_endian(),
        );

        self.buf.clear();
        header.encode(&mut self.buf)?;
        self.buf.extend_from_slice(&page.data);

        let offset = frame_offset(frame_no, wh.page_size);
        self.file.write_at(offset, &self.buf).context(|| {
            format!("write frame {} at offset {}", frame_no, offset)
        })?;

        self.index.set_page(frame_no, page.page_no)?;

        self.frames = frame_no;
        self.checksum = header.checksum;

        debug!(
            "Appended frame {} at offset {}: page: {}, db_size: {}",
            frame_no, offset, page.page_no, db_size
        );
        Ok(())
    }

    pub(crate) fn sync(&mut self, policy: SyncPolicy) -> Result<(), io::Error> {
        self.file.sync(policy)
    }

    /// Moves the writer back to the commit described by `at`; frames after
    /// it will be overwritten.
    pub(crate) fn reset_to(&mut self, at: &IndexHeader) {
        self.rewind(at.mx_frame, at.frame_checksum);
    }

    /// Moves the writer back to frame `frames`, whose checksum ends the
    /// chain at `checksum`.
    pub(crate) fn rewind(&mut self, frames: u32, checksum: WalChecksum) {
        self.frames = frames;
        self.checksum = checksum;
    }

    /// Cuts the WAL file down to `size` bytes if it is longer.
    pub(crate) fn truncate(&mut self, size: u64) -> Result<(), io::Error> {
        if self.file.size()? > size {
            self.file
                .truncate(size)
                .context(|| format!("truncate WAL to {} bytes", size))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use codeq::Decode;

    use super::FrameWriter;
    use crate::api::log_file::LogFile;
    use crate::errors::WalError;
    use crate::shm::DatabaseMode;
    use crate::shm::HeapBackend;
    use crate::shm::ShmConnection;
    use crate::shm::ShmDatabase;
    use crate::testing::page;
    use crate::testing::MemFile;
    use crate::types::SyncPolicy;
    use crate::wal::checksum::WalChecksum;
    use crate::wal::frame::FrameHeader;
    use crate::wal::frame_offset;
    use crate::wal::wal_header::WalHeader;
    use crate::wal::wal_index::IndexHeader;
    use crate::wal::wal_index::WalIndex;

    fn new_writer(file: MemFile) -> FrameWriter<MemFile> {
        let db = ShmDatabase::with_backend(
            DatabaseMode::SingleProcess,
            Box::new(HeapBackend),
        );
        let index = WalIndex::new(ShmConnection::shared(db));
        FrameWriter::new(file, index, None, &IndexHeader::default())
    }

    #[test]
    fn test_frames_are_chained() -> Result<(), WalError> {
        let file = MemFile::new();
        let mut w = new_writer(file.clone());

        assert_eq!(0, w.tail_offset());

        w.start_wal(512, false, SyncPolicy::None)?;
        let wh = *w.wal_header().unwrap();
        assert_eq!(0, wh.checkpoint_seq);
        assert_eq!(32, w.tail_offset());

        w.append(&page(3, 0, 512), 0)?;
        w.append(&page(4, 0, 512), 4)?;
        assert_eq!(2, w.frames());
        assert_eq!(32 + 2 * 536, w.tail_offset());
        assert_eq!(32 + 2 * 536, file.size()?);

        // Recompute the chain from the bytes on disk.
        let bytes = file.bytes();
        let decoded = WalHeader::decode(&bytes[..32])?;
        assert_eq!(wh, decoded);

        let mut prev = wh.checksum;
        for (frame_no, page_no) in [(1, 3), (2, 4)] {
            let off = frame_offset(frame_no, 512) as usize;
            let fh = FrameHeader::decode(&bytes[off..off + 24])?;
            assert_eq!(page_no, fh.page_no);

            let payload = &bytes[off + 24..off + 536];
            let want = prev
                .fold(&bytes[off..off + 8], false)
                .fold(payload, false);
            assert_eq!(want, fh.checksum);
            prev = want;
        }
        assert_eq!(prev, w.checksum());

        assert_eq!(Some(2), w.index_mut().find_frame(4, 2)?);
        Ok(())
    }

    #[test]
    fn test_reset_overwrites_tail() -> Result<(), WalError> {
        let file = MemFile::new();
        let mut w = new_writer(file.clone());

        w.start_wal(512, true, SyncPolicy::None)?;
        w.append(&page(1, 0, 512), 1)?;

        let at = IndexHeader {
            page_size: 512,
            mx_frame: 1,
            frame_checksum: w.checksum(),
            ..Default::default()
        };

        w.append(&page(2, 0, 512), 0)?;
        w.reset_to(&at);
        w.truncate(at.commit_boundary())?;
        assert_eq!(32 + 536, file.size()?);

        w.append(&page(5, 0, 512), 0)?;
        let bytes = file.bytes();
        let fh = FrameHeader::decode(&bytes[32 + 536..32 + 536 + 24])?;
        assert_eq!(5, fh.page_no);

        let want = at.frame_checksum.fold(&bytes[568..576], true);
        let want = want.fold(&bytes[592..1104], true);
        assert_eq!(want, fh.checksum);
        assert_ne!(WalChecksum::default(), want);

        Ok(())
    }

    #[test]
    fn test_restart_bumps_checkpoint_seq() -> Result<(), WalError> {
        let mut w = new_writer(MemFile::new());

        w.start_wal(1024, true, SyncPolicy::None)?;
        let first = *w.wal_header().unwrap();

        w.start_wal(1024, true, SyncPolicy::None)?;
        let second = *w.wal_header().unwrap();

        assert_eq!(first.checkpoint_seq + 1, second.checkpoint_seq);
        assert_eq!(second.checksum, w.checksum());
        Ok(())
    }
}
