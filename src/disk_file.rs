use std::fs::File;
use std::fs::OpenOptions;
use std::io;

use codeq::error_context_ext::ErrorContextExt;

use crate::api::log_file::LogFile;
use crate::types::SyncPolicy;

/// A WAL file on disk.
#[derive(Debug)]
pub struct DiskFile {
    path: String,
    f: File,
}

impl DiskFile {
    /// Opens the file for reading and writing, creating it if absent.
    pub fn open(path: impl ToString) -> Result<Self, io::Error> {
        let path = path.to_string();

        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .context(|| format!("open WAL file '{}'", path))?;

        Ok(Self { path, f })
    }

    /// Opens an existing file for reading only.
    pub fn open_read_only(path: impl ToString) -> Result<Self, io::Error> {
        let path = path.to_string();

        let f = OpenOptions::new()
            .read(true)
            .open(&path)
            .context(|| format!("open WAL file '{}' read-only", path))?;

        Ok(Self { path, f })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl LogFile for DiskFile {
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), io::Error> {
        positioned::write_all_at(&self.f, buf, offset)
    }

    // Positioned reads: readers sharing the file never race on a cursor.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), io::Error> {
        positioned::read_exact_at(&self.f, buf, offset)
    }

    fn sync(&mut self, policy: SyncPolicy) -> Result<(), io::Error> {
        match policy {
            SyncPolicy::None => Ok(()),
            SyncPolicy::Normal => self.f.sync_data(),
            SyncPolicy::Full => self.f.sync_all(),
        }
    }

    fn size(&self) -> Result<u64, io::Error> {
        Ok(self.f.metadata()?.len())
    }

    fn truncate(&mut self, size: u64) -> Result<(), io::Error> {
        self.f.set_len(size)
    }
}

#[cfg(unix)]
mod positioned {
    use std::fs::File;
    use std::io;
    use std::os::unix::fs::FileExt;

    pub(super) fn write_all_at(
        f: &File,
        buf: &[u8],
        offset: u64,
    ) -> Result<(), io::Error> {
        f.write_all_at(buf, offset)
    }

    pub(super) fn read_exact_at(
        f: &File,
        buf: &mut [u8],
        offset: u64,
    ) -> Result<(), io::Error> {
        f.read_exact_at(buf, offset)
    }
}

#[cfg(windows)]
mod positioned {
    use std::fs::File;
    use std::io;
    use std::os::windows::fs::FileExt;

    pub(super) fn write_all_at(
        f: &File,
        mut buf: &[u8],
        mut offset: u64,
    ) -> Result<(), io::Error> {
        while !buf.is_empty() {
            let n = f.seek_write(buf, offset)?;
            if n == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            buf = &buf[n..];
            offset += n as u64;
        }
        Ok(())
    }

    pub(super) fn read_exact_at(
        f: &File,
        mut buf: &mut [u8],
        mut offset: u64,
    ) -> Result<(), io::Error> {
        while !buf.is_empty() {
            let n = f.seek_read(buf, offset)?;
            if n == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            let rest = buf;
            buf = &mut rest[n..];
            offset += n as u64;
        }
        Ok(())
    }
}
