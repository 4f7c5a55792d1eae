use byteorder::ByteOrder;
use byteorder::NativeEndian;

use crate::errors::Busy;
use crate::errors::Corrupt;
use crate::errors::ShmError;
use crate::errors::WalError;
use crate::shm::ShmChunk;
use crate::shm::ShmConnection;
use crate::shm::ShmDatabase;
use crate::shm::ShmMode;
use crate::shm::SHM_CHUNK_SIZE;
use crate::wal::checksum::WalChecksum;
use crate::wal::wal_header::Salts;
use crate::wal::wal_header::WAL_FORMAT_VERSION;

/// Bytes at the start of chunk 0 taken by the two index header copies.
pub(crate) const HEADER_AREA: usize = 2 * IndexHeader::SIZE;

/// Page-number entries that fit in chunk 0 after the headers.
const FIRST_CHUNK_ENTRIES: usize = (SHM_CHUNK_SIZE - HEADER_AREA) / 4;

/// Page-number entries in every later chunk.
const CHUNK_ENTRIES: usize = SHM_CHUNK_SIZE / 4;

/// Header of the WAL index, describing the last published commit.
///
/// Stored twice at the start of chunk 0, 48 bytes each, native byte order:
///
/// | offset | size | field |
/// |---|---|---|
/// | 0 | 4 | version |
/// | 4 | 4 | change counter |
/// | 8 | 1 | is-init |
/// | 9 | 1 | big-endian WAL checksums |
/// | 10 | 2 | unused |
/// | 12 | 4 | page size |
/// | 16 | 4 | `mx_frame` |
/// | 20 | 4 | database size in pages |
/// | 24 | 8 | running frame checksum at `mx_frame` |
/// | 32 | 8 | salts |
/// | 40 | 8 | checksum of bytes 0..40 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexHeader {
    /// Incremented on every publish.
    pub change: u32,
    pub big_endian: bool,
    pub page_size: u32,
    /// Last frame of the last commit; 0 for an empty WAL.
    pub mx_frame: u32,
    pub n_page: u32,
    pub frame_checksum: WalChecksum,
    pub salts: Salts,
}

impl IndexHeader {
    pub const SIZE: usize = 48;

    const CHECKSUMMED: usize = 40;

    pub(crate) fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut b = [0u8; Self::SIZE];

        NativeEndian::write_u32(&mut b[0..4], WAL_FORMAT_VERSION);
        NativeEndian::write_u32(&mut b[4..8], self.change);
        b[8] = 1;
        b[9] = self.big_endian as u8;
        NativeEndian::write_u32(&mut b[12..16], self.page_size);
        NativeEndian::write_u32(&mut b[16..20], self.mx_frame);
        NativeEndian::write_u32(&mut b[20..24], self.n_page);
        NativeEndian::write_u32(&mut b[24..28], self.frame_checksum.s1);
        NativeEndian::write_u32(&mut b[28..32], self.frame_checksum.s2);
        NativeEndian::write_u32(&mut b[32..36], self.salts.salt1);
        NativeEndian::write_u32(&mut b[36..40], self.salts.salt2);

        let c = Self::checksum_of(&b);
        NativeEndian::write_u32(&mut b[40..44], c.s1);
        NativeEndian::write_u32(&mut b[44..48], c.s2);

        b
    }

    /// Parses a header copy. An all-zero is-init byte means the index was
    /// never published and yields `None`.
    pub(crate) fn from_bytes(b: &[u8]) -> Result<Option<Self>, Corrupt> {
        debug_assert_eq!(b.len(), Self::SIZE);

        if b[8] == 0 {
            return Ok(None);
        }

        let version = NativeEndian::read_u32(&b[0..4]);
        if version != WAL_FORMAT_VERSION {
            return Err(Corrupt::new(format!(
                "unsupported WAL index version: {}",
                version
            )));
        }

        let stored = WalChecksum::new(
            NativeEndian::read_u32(&b[40..44]),
            NativeEndian::read_u32(&b[44..48]),
        );
        let want = Self::checksum_of(b);
        if stored != want {
            return Err(Corrupt::new(format!(
                "WAL index header checksum mismatch: stored {}, computed {}",
                stored, want
            )));
        }

        Ok(Some(Self {
            change: NativeEndian::read_u32(&b[4..8]),
            big_endian: b[9] != 0,
            page_size: NativeEndian::read_u32(&b[12..16]),
            mx_frame: NativeEndian::read_u32(&b[16..20]),
            n_page: NativeEndian::read_u32(&b[20..24]),
            frame_checksum: WalChecksum::new(
                NativeEndian::read_u32(&b[24..28]),
                NativeEndian::read_u32(&b[28..32]),
            ),
            salts: Salts::new(
                NativeEndian::read_u32(&b[32..36]),
                NativeEndian::read_u32(&b[36..40]),
            ),
        }))
    }

    fn checksum_of(b: &[u8]) -> WalChecksum {
        WalChecksum::default()
            .fold(&b[..Self::CHECKSUMMED], cfg!(target_endian = "big"))
    }

    /// Byte offset in the WAL file right after frame `mx_frame`.
    pub fn commit_boundary(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        crate::wal::wal_size(self.mx_frame, self.page_size)
    }
}

/// The frame-number to page-number map of a WAL, kept in shared-memory
/// chunks.
///
/// Entry `n` holds the page number of frame `n`; only entries up to the
/// `mx_frame` of a header are meaningful to a reader of that header.
///
/// Only the WAL writer, holding the writer lock, publishes headers and
/// records frames:
///
/// ```compile_fail
/// use shm_wal::{DatabaseMode, HeapBackend, IndexHeader};
/// use shm_wal::{ShmConnection, ShmDatabase, WalIndex};
///
/// let db = ShmDatabase::with_backend(DatabaseMode::SingleProcess, Box::new(HeapBackend));
/// let mut index = WalIndex::new(ShmConnection::shared(db));
/// index.write_header(&IndexHeader::default()).unwrap();
/// ```
///
/// ```compile_fail
/// use shm_wal::{DatabaseMode, HeapBackend};
/// use shm_wal::{ShmConnection, ShmDatabase, WalIndex};
///
/// let db = ShmDatabase::with_backend(DatabaseMode::SingleProcess, Box::new(HeapBackend));
/// let mut index = WalIndex::new(ShmConnection::shared(db));
/// index.set_page(1, 7).unwrap();
/// ```
#[derive(Debug)]
pub struct WalIndex {
    conn: ShmConnection,
}

impl WalIndex {
    pub fn new(conn: ShmConnection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &ShmConnection {
        &self.conn
    }

    /// Returns the chunk index and byte offset of the entry for `frame_no`.
    pub(crate) fn locate(frame_no: u32) -> (usize, usize) {
        debug_assert!(frame_no > 0);

        let k = frame_no as usize - 1;
        if k < FIRST_CHUNK_ENTRIES {
            (0, HEADER_AREA + k * 4)
        } else {
            let k = k - FIRST_CHUNK_ENTRIES;
            (1 + k / CHUNK_ENTRIES, (k % CHUNK_ENTRIES) * 4)
        }
    }

    /// Reads the index header.
    ///
    /// Copy 0 is read first, then copy 1; differing copies mean a writer is
    /// in the middle of publishing and yield `Busy`.
    pub fn read_header(&mut self) -> Result<Option<IndexHeader>, WalError> {
        self.conn.ensure_chunks(1)?;
        Self::header_in(&self.conn.chunks()[0])
    }

    /// Reads the header last published in the shared index of `db`, without
    /// giving the caller a handle to its chunks.
    ///
    /// `None` if no header was ever published. A single-process database
    /// that has not published chunk 0 has no header; a multi-process one
    /// maps chunk 0 to find out.
    pub(crate) fn published_header(
        db: &ShmDatabase,
    ) -> Result<Option<IndexHeader>, WalError> {
        let chunk0 = match db.mode() {
            ShmMode::MultiProcess => db.acquire_range(0, 1)?.pop(),
            ShmMode::SingleProcess | ShmMode::ReadOnlySnapshot => db.chunk(0),
        };

        match chunk0 {
            Some(c) => Self::header_in(&c),
            None => Ok(None),
        }
    }

    fn header_in(chunk0: &ShmChunk) -> Result<Option<IndexHeader>, WalError> {
        let (h0, h1) = chunk0.with(|b| {
            let mut h0 = [0u8; IndexHeader::SIZE];
            let mut h1 = [0u8; IndexHeader::SIZE];
            h0.copy_from_slice(&b[..IndexHeader::SIZE]);
            h1.copy_from_slice(&b[IndexHeader::SIZE..HEADER_AREA]);
            (h0, h1)
        });

        if h0 != h1 {
            return Err(Busy::new("WAL index header is being updated").into());
        }

        Ok(IndexHeader::from_bytes(&h0)?)
    }

    /// Publishes a new header: copy 1 is written before copy 0.
    pub(crate) fn write_header(&mut self, hdr: &IndexHeader) -> Result<(), WalError> {
        self.conn.ensure_chunks(1)?;

        let b = hdr.to_bytes();
        self.conn.chunks()[0].with_mut(|mem| {
            mem[IndexHeader::SIZE..HEADER_AREA].copy_from_slice(&b);
            mem[..IndexHeader::SIZE].copy_from_slice(&b);
        });

        Ok(())
    }

    /// Records that frame `frame_no` holds page `page_no`, growing the
    /// chunks as needed.
    pub(crate) fn set_page(
        &mut self,
        frame_no: u32,
        page_no: u32,
    ) -> Result<(), ShmError> {
        let (chunk, offset) = Self::locate(frame_no);
        self.conn.ensure_chunks(chunk + 1)?;
        self.conn.chunks()[chunk].write_u32(offset, page_no);
        Ok(())
    }

    /// Returns the page number recorded for frame `frame_no`.
    pub fn page_at(&mut self, frame_no: u32) -> Result<u32, ShmError> {
        let (chunk, offset) = Self::locate(frame_no);
        self.conn.ensure_chunks(chunk + 1)?;
        Ok(self.conn.chunks()[chunk].read_u32(offset))
    }

    /// Returns the latest frame, not after `mx_frame`, that holds `page_no`.
    pub fn find_frame(
        &mut self,
        page_no: u32,
        mx_frame: u32,
    ) -> Result<Option<u32>, ShmError> {
        if mx_frame == 0 {
            return Ok(None);
        }

        let (last_chunk, _) = Self::locate(mx_frame);
        self.conn.ensure_chunks(last_chunk + 1)?;

        // Scan one chunk at a time, newest frames first.
        let mut frame_no = mx_frame;
        while frame_no > 0 {
            let (chunk, _) = Self::locate(frame_no);
            let found = self.conn.chunks()[chunk].with(|b| {
                loop {
                    let (c, offset) = Self::locate(frame_no);
                    if c != chunk {
                        return None;
                    }
                    if NativeEndian::read_u32(&b[offset..offset + 4]) == page_no
                    {
                        return Some(frame_no);
                    }
                    frame_no -= 1;
                    if frame_no == 0 {
                        return None;
                    }
                }
            });

            if found.is_some() {
                return Ok(found);
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::IndexHeader;
    use super::WalIndex;
    use super::FIRST_CHUNK_ENTRIES;
    use crate::errors::WalError;
    use crate::shm::DatabaseMode;
    use crate::shm::HeapBackend;
    use crate::shm::ShmConnection;
    use crate::shm::ShmDatabase;
    use crate::shm::SHM_CHUNK_SIZE;
    use crate::wal::checksum::WalChecksum;
    use crate::wal::wal_header::Salts;

    fn new_index() -> WalIndex {
        let db = ShmDatabase::with_backend(
            DatabaseMode::SingleProcess,
            Box::new(HeapBackend),
        );
        WalIndex::new(ShmConnection::shared(db))
    }

    fn sample_header() -> IndexHeader {
        IndexHeader {
            change: 3,
            big_endian: true,
            page_size: 4096,
            mx_frame: 17,
            n_page: 5,
            frame_checksum: WalChecksum::new(11, 12),
            salts: Salts::new(21, 22),
        }
    }

    #[test]
    fn test_locate() {
        assert_eq!(8168, FIRST_CHUNK_ENTRIES);

        assert_eq!((0, 96), WalIndex::locate(1));
        assert_eq!((0, 100), WalIndex::locate(2));
        assert_eq!((0, SHM_CHUNK_SIZE - 4), WalIndex::locate(8168));
        assert_eq!((1, 0), WalIndex::locate(8169));
        assert_eq!((1, SHM_CHUNK_SIZE - 4), WalIndex::locate(8168 + 8192));
        assert_eq!((2, 0), WalIndex::locate(8168 + 8192 + 1));
    }

    #[test]
    fn test_header_publish_and_read() -> Result<(), WalError> {
        let mut idx = new_index();

        assert_eq!(None, idx.read_header()?);

        let h = sample_header();
        idx.write_header(&h)?;
        assert_eq!(Some(h), idx.read_header()?);
        assert_eq!(32 + 17 * (24 + 4096), h.commit_boundary());

        Ok(())
    }

    #[test]
    fn test_header_torn_or_damaged() -> Result<(), WalError> {
        let mut idx = new_index();
        idx.write_header(&sample_header())?;

        let chunk0 = idx.connection().chunk(0).unwrap().clone();

        // Copy 1 updated, copy 0 not yet.
        let newer = IndexHeader {
            mx_frame: 18,
            ..sample_header()
        };
        chunk0.with_mut(|b| b[48..96].copy_from_slice(&newer.to_bytes()));
        assert!(matches!(idx.read_header(), Err(WalError::Busy(_))));

        // Both copies damaged the same way.
        chunk0.with_mut(|b| {
            b[48..96].copy_from_slice(&sample_header().to_bytes());
            b[16] ^= 1;
            b[64] ^= 1;
        });
        assert!(matches!(idx.read_header(), Err(WalError::Corrupt(_))));

        Ok(())
    }

    #[test]
    fn test_pages_across_chunks() -> Result<(), WalError> {
        let mut idx = new_index();

        let last = FIRST_CHUNK_ENTRIES as u32 + 10;
        for frame_no in 1..=last {
            idx.set_page(frame_no, frame_no % 7 + 1)?;
        }
        assert_eq!(2, idx.connection().len());

        assert_eq!(last % 7 + 1, idx.page_at(last)?);

        // Frame 8176 is the newest holding page 1 up to `last` = 8178.
        assert_eq!(Some(8176), idx.find_frame(1, last)?);

        // Bounded by mx_frame: frames in chunk 1 are not visible.
        let mx = FIRST_CHUNK_ENTRIES as u32;
        let want = (1..=mx).rev().find(|f| f % 7 + 1 == 1);
        assert_eq!(want, idx.find_frame(1, mx)?);

        assert_eq!(None, idx.find_frame(9, last)?);
        assert_eq!(None, idx.find_frame(1, 0)?);

        Ok(())
    }
}
