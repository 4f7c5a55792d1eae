use std::io;

use codeq::OffsetSize;

use crate::errors::WalError;
use crate::num::format_pad9_u64;
use crate::wal::frame_iter::FrameEntry;

/// Writes one frame per line, or the error that stopped the scan.
pub fn multiline_string<W: io::Write>(
    w: &mut W,
    res: Result<FrameEntry, WalError>,
) -> Result<(), io::Error> {
    match res {
        Ok(entry) => {
            writeln!(
                w,
                "  F-{:05}: [{}, {}) page: {}, commit: {}",
                entry.frame_no,
                format_pad9_u64(*entry.segment.offset()),
                format_pad9_u64(*entry.segment.end()),
                entry.header.page_no,
                entry.header.db_size,
            )?;
        }
        Err(e) => {
            writeln!(w, "Error: {}", e)?;
        }
    }
    Ok(())
}
