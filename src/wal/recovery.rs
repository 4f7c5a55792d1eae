use codeq::error_context_ext::ErrorContextExt;
use codeq::Decode;
use log::info;
use log::warn;

use crate::api::log_file::LogFile;
use crate::errors::WalError;
use crate::wal::frame_iter::FrameIter;
use crate::wal::wal_header::WalHeader;
use crate::wal::wal_index::IndexHeader;
use crate::wal::wal_index::WalIndex;

/// Reads and verifies the WAL header.
///
/// Returns `None` for a WAL too short to hold one, `Corrupt` for an invalid
/// one.
pub(crate) fn read_wal_header<F>(file: &F) -> Result<Option<WalHeader>, WalError>
where F: LogFile + ?Sized {
    let size = file.size().context(|| "stat WAL file".to_string())?;
    if size < WalHeader::SIZE as u64 {
        return Ok(None);
    }

    let mut buf = [0u8; WalHeader::SIZE];
    file.read_at(0, &mut buf).context(|| "read WAL header".to_string())?;

    let h = WalHeader::decode(&buf[..])?;
    h.verify()?;

    Ok(Some(h))
}

/// What [`recover_index`] found in the WAL file.
#[derive(Debug, Clone)]
pub(crate) struct Recovered {
    pub(crate) wal_header: Option<WalHeader>,

    /// The published index header, describing the last commit found.
    pub(crate) index_header: IndexHeader,

    /// Valid frames found after the last commit frame, discarded.
    pub(crate) discarded: u32,
}

/// Rebuilds the WAL index from the WAL file and publishes its header.
///
/// Frames are scanned until the first one that is short or breaks the
/// checksum chain; everything up to the last commit frame before that point
/// is kept. An invalid WAL header makes the WAL count as empty.
///
/// With `upto`, frames after frame `upto` are not scanned: the index never
/// describes a commit later than that frame.
pub(crate) fn recover_index<F>(
    file: &F,
    index: &mut WalIndex,
    change: u32,
    upto: Option<u32>,
) -> Result<Recovered, WalError>
where F: LogFile + ?Sized {
    let wal_header = match read_wal_header(file) {
        Ok(h) => h,
        Err(WalError::Corrupt(e)) => {
            warn!("WAL header is invalid, WAL treated as empty: {}", e);
            None
        }
        Err(e) => return Err(e),
    };

    let mut hdr = IndexHeader {
        change,
        ..Default::default()
    };
    let mut valid = 0;

    if let Some(wh) = wal_header {
        hdr.big_endian = wh.big_endian();
        hdr.page_size = wh.page_size;
        hdr.salts = wh.salts;
        hdr.frame_checksum = wh.checksum;

        let size = file.size().context(|| "stat WAL file".to_string())?;

        for res in FrameIter::new(file, wh, size) {
            let entry = match res {
                Ok(x) => x,
                Err(WalError::Corrupt(e)) => {
                    warn!("WAL scan stopped after frame {}: {}", valid, e);
                    break;
                }
                Err(e) => return Err(e),
            };

            if upto.is_some_and(|max| entry.frame_no > max) {
                break;
            }

            index.set_page(entry.frame_no, entry.header.page_no)?;
            valid = entry.frame_no;

            if entry.header.is_commit() {
                hdr.mx_frame = entry.frame_no;
                hdr.n_page = entry.header.db_size;
                hdr.frame_checksum = entry.header.checksum;
            }
        }
    }

    let discarded = valid - hdr.mx_frame;
    if discarded > 0 {
        warn!(
            "Discarded {} uncommitted frames after frame {}",
            discarded, hdr.mx_frame
        );
    }

    index.write_header(&hdr)?;

    info!(
        "WAL index recovered: mx_frame: {}, n_page: {}, commit_boundary: {}",
        hdr.mx_frame,
        hdr.n_page,
        hdr.commit_boundary()
    );

    Ok(Recovered {
        wal_header,
        index_header: hdr,
        discarded,
    })
}
