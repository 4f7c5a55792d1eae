use std::io;

use crate::api::log_file::LogFile;
use crate::disk_file::DiskFile;
use crate::dump_writer;
use crate::errors::WalError;
use crate::wal::frame_iter::FrameEntry;
use crate::wal::frame_iter::FrameIter;
use crate::wal::recovery::read_wal_header;
use crate::Config;

/// Prints the content of a WAL file: its header and every valid frame, up
/// to the first broken one.
pub struct Dump {
    wal_path: String,
}

impl Dump {
    /// Dumps the WAL of the database described by `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            wal_path: config.wal_path(),
        }
    }

    /// Dumps the WAL file at `path`.
    pub fn wal_file(path: impl ToString) -> Self {
        Self {
            wal_path: path.to_string(),
        }
    }

    pub fn write_to_string(&self) -> Result<String, io::Error> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        String::from_utf8(buf).map_err(io::Error::other)
    }

    pub fn write<W: io::Write>(&self, w: W) -> Result<(), io::Error> {
        self.write_with(w, dump_writer::multiline_string)
    }

    pub fn write_with<W: io::Write, D>(
        &self,
        mut w: W,
        write_frame: D,
    ) -> Result<(), io::Error>
    where
        D: Fn(&mut W, Result<FrameEntry, WalError>) -> Result<(), io::Error>,
    {
        let file = DiskFile::open_read_only(&self.wal_path)?;
        Self::dump_file(&file, &mut w, write_frame)
    }

    pub(crate) fn dump_file<F, W, D>(
        file: &F,
        w: &mut W,
        write_frame: D,
    ) -> Result<(), io::Error>
    where
        F: LogFile,
        W: io::Write,
        D: Fn(&mut W, Result<FrameEntry, WalError>) -> Result<(), io::Error>,
    {
        let wal_header = match read_wal_header(file) {
            Ok(Some(h)) => h,
            Ok(None) => {
                writeln!(w, "WAL: empty")?;
                return Ok(());
            }
            Err(e) => {
                writeln!(w, "Error: {}", e)?;
                return Ok(());
            }
        };

        writeln!(w, "{}", wal_header)?;

        let size = file.size()?;
        for res in FrameIter::new(file, wal_header, size) {
            write_frame(w, res)?;
        }
        Ok(())
    }
}
