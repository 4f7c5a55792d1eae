use std::fmt;

use byteorder::BigEndian;
use byteorder::ByteOrder;
use byteorder::LittleEndian;

/// The running two-word checksum that chains the WAL header and its frames.
///
/// Input is consumed as 8-byte words `(x0, x1)`:
/// `s1 += x0 + s2; s2 += x1 + s1`, all wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalChecksum {
    pub s1: u32,
    pub s2: u32,
}

impl fmt::Display for WalChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:08x}, {:08x})", self.s1, self.s2)
    }
}

impl WalChecksum {
    pub fn new(s1: u32, s2: u32) -> Self {
        Self { s1, s2 }
    }

    /// Fold `data` into this checksum and return the result.
    ///
    /// `big_endian` selects how every 4-byte word is decoded.
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` is not a multiple of 8.
    pub fn fold(self, data: &[u8], big_endian: bool) -> Self {
        assert_eq!(
            data.len() % 8,
            0,
            "checksummed data must be a multiple of 8 bytes"
        );

        if big_endian {
            self.fold_words::<BigEndian>(data)
        } else {
            self.fold_words::<LittleEndian>(data)
        }
    }

    fn fold_words<B: ByteOrder>(self, data: &[u8]) -> Self {
        let mut s1 = self.s1;
        let mut s2 = self.s2;

        for word in data.chunks_exact(8) {
            let x0 = B::read_u32(&word[0..4]);
            let x1 = B::read_u32(&word[4..8]);

            s1 = s1.wrapping_add(x0).wrapping_add(s2);
            s2 = s2.wrapping_add(x1).wrapping_add(s1);
        }

        Self { s1, s2 }
    }
}
