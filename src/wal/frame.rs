use std::io;

use byteorder::BigEndian;
use byteorder::ByteOrder;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::errors::Corrupt;
use crate::wal::checksum::WalChecksum;
use crate::wal::wal_header::Salts;

/// The 24-byte big-endian header in front of every page in the WAL.
///
/// - 4 bytes: page number
/// - 4 bytes: database size in pages for a commit frame, otherwise 0
/// - 8 bytes: salts of the WAL header
/// - 8 bytes: running checksum up to and including this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub page_no: u32,
    pub db_size: u32,
    pub salts: Salts,
    pub checksum: WalChecksum,
}

impl FrameHeader {
    pub const SIZE: usize = 24;

    /// Builds the header of a frame and chains its checksum onto `prev`.
    pub fn seal(
        page_no: u32,
        db_size: u32,
        salts: Salts,
        prev: WalChecksum,
        payload: &[u8],
        big_endian: bool,
    ) -> Self {
        let checksum = Self::chain(page_no, db_size, prev, payload, big_endian);
        Self {
            page_no,
            db_size,
            salts,
            checksum,
        }
    }

    /// A frame that ends a transaction carries the database size.
    pub fn is_commit(&self) -> bool {
        self.db_size != 0
    }

    /// Check that this frame belongs to the WAL generation identified by
    /// `salts` and continues the chain ending in `prev`.
    ///
    /// Returns the checksum the next frame chains onto.
    pub fn verify(
        &self,
        salts: Salts,
        prev: WalChecksum,
        payload: &[u8],
        big_endian: bool,
    ) -> Result<WalChecksum, Corrupt> {
        if self.salts != salts {
            return Err(Corrupt::new(format!(
                "frame salts {:?} do not match WAL salts {:?}",
                self.salts, salts
            )));
        }

        let want = Self::chain(
            self.page_no,
            self.db_size,
            prev,
            payload,
            big_endian,
        );
        if want != self.checksum {
            return Err(Corrupt::new(format!(
                "frame checksum mismatch: stored {}, computed {}",
                self.checksum, want
            )));
        }

        if self.page_no == 0 {
            return Err(Corrupt::new("frame with page number 0"));
        }

        Ok(want)
    }

    fn chain(
        page_no: u32,
        db_size: u32,
        prev: WalChecksum,
        payload: &[u8],
        big_endian: bool,
    ) -> WalChecksum {
        let mut first = [0u8; 8];
        BigEndian::write_u32(&mut first[0..4], page_no);
        BigEndian::write_u32(&mut first[4..8], db_size);

        prev.fold(&first, big_endian).fold(payload, big_endian)
    }
}

impl codeq::Encode for FrameHeader {
    fn encode<W: io::Write>(&self, mut w: W) -> Result<usize, io::Error> {
        w.write_u32::<BigEndian>(self.page_no)?;
        w.write_u32::<BigEndian>(self.db_size)?;
        w.write_u32::<BigEndian>(self.salts.salt1)?;
        w.write_u32::<BigEndian>(self.salts.salt2)?;
        w.write_u32::<BigEndian>(self.checksum.s1)?;
        w.write_u32::<BigEndian>(self.checksum.s2)?;
        Ok(Self::SIZE)
    }
}

impl codeq::Decode for FrameHeader {
    fn decode<R: io::Read>(mut r: R) -> Result<Self, io::Error> {
        let page_no = r.read_u32::<BigEndian>()?;
        let db_size = r.read_u32::<BigEndian>()?;
        let salt1 = r.read_u32::<BigEndian>()?;
        let salt2 = r.read_u32::<BigEndian>()?;
        let s1 = r.read_u32::<BigEndian>()?;
        let s2 = r.read_u32::<BigEndian>()?;

        Ok(Self {
            page_no,
            db_size,
            salts: Salts::new(salt1, salt2),
            checksum: WalChecksum::new(s1, s2),
        })
    }
}
