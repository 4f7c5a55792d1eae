use std::fmt;
use std::io;

use byteorder::BigEndian;
use byteorder::ByteOrder;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::errors::Corrupt;
use crate::errors::InvalidInput;
use crate::wal::checksum::WalChecksum;

/// Magic of a WAL whose checksum words are little-endian.
pub const WAL_MAGIC_LE: u32 = 0x377f0682;

/// Magic of a WAL whose checksum words are big-endian.
pub const WAL_MAGIC_BE: u32 = 0x377f0683;

/// File format version written in the WAL header and the index header.
pub const WAL_FORMAT_VERSION: u32 = 3007000;

pub const MIN_PAGE_SIZE: u32 = 512;
pub const MAX_PAGE_SIZE: u32 = 65536;

/// Check that `page_size` is a power of two in `512..=65536`.
pub fn validate_page_size(page_size: u32) -> Result<(), InvalidInput> {
    if !page_size.is_power_of_two()
        || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size)
    {
        return Err(InvalidInput::new(format!(
            "page size {} is not a power of two in [{}, {}]",
            page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
        )));
    }
    Ok(())
}

/// The pair of random values that identifies one generation of a WAL.
///
/// Every frame repeats the salts of the header it was written under; a frame
/// with other salts is left over from an earlier generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Salts {
    pub salt1: u32,
    pub salt2: u32,
}

impl Salts {
    pub fn new(salt1: u32, salt2: u32) -> Self {
        Self { salt1, salt2 }
    }

    pub fn random() -> Self {
        Self {
            salt1: rand::random(),
            salt2: rand::random(),
        }
    }
}

/// The 32-byte header at the start of a WAL file.
///
/// All fields are big-endian:
/// - 4 bytes: magic, selects the checksum byte order
/// - 4 bytes: format version
/// - 4 bytes: page size
/// - 4 bytes: checkpoint sequence
/// - 8 bytes: salts
/// - 8 bytes: checksum of the first 24 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalHeader {
    pub magic: u32,
    pub version: u32,
    pub page_size: u32,
    pub checkpoint_seq: u32,
    pub salts: Salts,
    pub checksum: WalChecksum,
}

impl fmt::Display for WalHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WAL(page_size: {}, checkpoint_seq: {}, checksum: {})",
            self.page_size,
            self.checkpoint_seq,
            if self.big_endian() { "be" } else { "le" }
        )
    }
}

impl WalHeader {
    pub const SIZE: usize = 32;

    /// Number of leading bytes covered by the header checksum.
    const CHECKSUMMED: usize = 24;

    /// Builds a header and computes its checksum.
    pub fn new(
        page_size: u32,
        checkpoint_seq: u32,
        salts: Salts,
        big_endian: bool,
    ) -> Self {
        let mut h = Self {
            magic: if big_endian { WAL_MAGIC_BE } else { WAL_MAGIC_LE },
            version: WAL_FORMAT_VERSION,
            page_size,
            checkpoint_seq,
            salts,
            checksum: WalChecksum::default(),
        };
        h.checksum = h.compute_checksum();
        h
    }

    /// Whether checksum words of this WAL are big-endian.
    pub fn big_endian(&self) -> bool {
        self.magic & 1 == 1
    }

    /// Size in bytes of one frame: header plus page.
    pub fn frame_size(&self) -> u64 {
        crate::wal::frame::FrameHeader::SIZE as u64 + self.page_size as u64
    }

    fn checksummed_bytes(&self) -> [u8; Self::CHECKSUMMED] {
        let mut b = [0u8; Self::CHECKSUMMED];
        BigEndian::write_u32(&mut b[0..4], self.magic);
        BigEndian::write_u32(&mut b[4..8], self.version);
        BigEndian::write_u32(&mut b[8..12], self.page_size);
        BigEndian::write_u32(&mut b[12..16], self.checkpoint_seq);
        BigEndian::write_u32(&mut b[16..20], self.salts.salt1);
        BigEndian::write_u32(&mut b[20..24], self.salts.salt2);
        b
    }

    fn compute_checksum(&self) -> WalChecksum {
        WalChecksum::default()
            .fold(&self.checksummed_bytes(), self.big_endian())
    }

    /// Check the magic, version, page size and checksum of a decoded header.
    pub fn verify(&self) -> Result<(), Corrupt> {
        if self.magic != WAL_MAGIC_LE && self.magic != WAL_MAGIC_BE {
            return Err(Corrupt::new(format!(
                "bad WAL magic: {:#010x}",
                self.magic
            )));
        }

        if self.version != WAL_FORMAT_VERSION {
            return Err(Corrupt::new(format!(
                "unsupported WAL version: {}",
                self.version
            )));
        }

        validate_page_size(self.page_size).map_err(|e| {
            Corrupt::new(format!("WAL header: {}", e.reason))
        })?;

        let want = self.compute_checksum();
        if want != self.checksum {
            return Err(Corrupt::new(format!(
                "WAL header checksum mismatch: stored {}, computed {}",
                self.checksum, want
            )));
        }

        Ok(())
    }
}

impl codeq::Encode for WalHeader {
    fn encode<W: io::Write>(&self, mut w: W) -> Result<usize, io::Error> {
        w.write_all(&self.checksummed_bytes())?;
        w.write_u32::<BigEndian>(self.checksum.s1)?;
        w.write_u32::<BigEndian>(self.checksum.s2)?;
        Ok(Self::SIZE)
    }
}

impl codeq::Decode for WalHeader {
    fn decode<R: io::Read>(mut r: R) -> Result<Self, io::Error> {
        let magic = r.read_u32::<BigEndian>()?;
        let version = r.read_u32::<BigEndian>()?;
        let page_size = r.read_u32::<BigEndian>()?;
        let checkpoint_seq = r.read_u32::<BigEndian>()?;
        let salt1 = r.read_u32::<BigEndian>()?;
        let salt2 = r.read_u32::<BigEndian>()?;
        let s1 = r.read_u32::<BigEndian>()?;
        let s2 = r.read_u32::<BigEndian>()?;

        Ok(Self {
            magic,
            version,
            page_size,
            checkpoint_seq,
            salts: Salts::new(salt1, salt2),
            checksum: WalChecksum::new(s1, s2),
        })
    }
}
