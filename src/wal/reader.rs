use std::sync::Arc;

use codeq::error_context_ext::ErrorContextExt;
use codeq::Decode;
use log::debug;

use crate::api::log_file::LogFile;
use crate::disk_file::DiskFile;
use crate::errors::Corrupt;
use crate::errors::WalError;
use crate::file_lock::WriterLock;
use crate::shm::ShmConnection;
use crate::shm::ShmDatabase;
use crate::shm::ShmMode;
use crate::wal::frame::FrameHeader;
use crate::wal::frame_offset;
use crate::wal::recovery::recover_index;
use crate::wal::wal_index::IndexHeader;
use crate::wal::wal_index::WalIndex;
use crate::Config;

/// The reader side of a WAL.
///
/// A shared reader consults the index the writer maintains. A read-only
/// reader never writes to shared memory: it rebuilds a private index from the
/// WAL file at every [`WalReader::begin_read`], up to the last commit the
/// writer published.
#[derive(Debug)]
pub struct WalReader<F = DiskFile>
where F: LogFile
{
    config: Arc<Config>,
    db: Arc<ShmDatabase>,
    file: F,
    index: WalIndex,
}

impl WalReader<DiskFile> {
    /// Opens a reader sharing the index of `db`.
    pub fn open(
        config: Arc<Config>,
        db: Arc<ShmDatabase>,
    ) -> Result<Self, WalError> {
        let file = DiskFile::open(config.wal_path())?;
        Ok(Self::open_with_file(config, db, file))
    }

    /// Opens a reader with a private index over an existing WAL file.
    pub fn open_read_only(
        config: Arc<Config>,
        db: Arc<ShmDatabase>,
    ) -> Result<Self, WalError> {
        let file = DiskFile::open_read_only(config.wal_path())?;
        Ok(Self::open_read_only_with_file(config, db, file))
    }
}

impl<F> WalReader<F>
where F: LogFile
{
    pub fn open_with_file(
        config: Arc<Config>,
        db: Arc<ShmDatabase>,
        file: F,
    ) -> Self {
        let index = WalIndex::new(ShmConnection::shared(db.clone()));
        Self {
            config,
            db,
            file,
            index,
        }
    }

    pub fn open_read_only_with_file(
        config: Arc<Config>,
        db: Arc<ShmDatabase>,
        file: F,
    ) -> Self {
        let index = WalIndex::new(ShmConnection::read_only_snapshot(db.clone()));
        Self {
            config,
            db,
            file,
            index,
        }
    }

    pub fn mode(&self) -> ShmMode {
        self.index.connection().mode()
    }

    /// Starts a read transaction on the last published commit.
    ///
    /// Returns `Busy` if the writer is publishing a commit at this moment,
    /// or if the shared index has to be rebuilt while the writer lock is
    /// held by someone else.
    pub fn begin_read(&mut self) -> Result<ReadSnapshot<'_, F>, WalError> {
        let header = match self.mode() {
            ShmMode::ReadOnlySnapshot => {
                // Frames past the published commit may belong to a failed
                // commit. The whole file is trusted only when no writer ever
                // published a header.
                let upto =
                    WalIndex::published_header(&self.db)?.map(|h| h.mx_frame);

                self.index = WalIndex::new(ShmConnection::read_only_snapshot(
                    self.db.clone(),
                ));
                recover_index(&self.file, &mut self.index, 0, upto)?
                    .index_header
            }
            ShmMode::SingleProcess | ShmMode::MultiProcess => {
                match self.index.read_header()? {
                    Some(h) => h,
                    None => self.recover_shared()?,
                }
            }
        };

        debug!(
            "Read snapshot ({}): mx_frame: {}, n_page: {}",
            self.mode(),
            header.mx_frame,
            header.n_page
        );

        Ok(ReadSnapshot {
            reader: self,
            header,
        })
    }

    /// Builds the shared index, which nobody has initialized yet.
    fn recover_shared(&mut self) -> Result<IndexHeader, WalError> {
        let _lock = WriterLock::new(self.config.clone())?;

        // A writer may have published between our read and the lock.
        if let Some(h) = self.index.read_header()? {
            return Ok(h);
        }

        Ok(recover_index(&self.file, &mut self.index, 0, None)?.index_header)
    }
}

/// A consistent view of the WAL as of one commit.
///
/// Frames written after `max_frame` are invisible, whatever the writer does
/// in the meantime.
#[derive(Debug)]
pub struct ReadSnapshot<'a, F>
where F: LogFile
{
    reader: &'a mut WalReader<F>,
    header: IndexHeader,
}

impl<F> ReadSnapshot<'_, F>
where F: LogFile
{
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    /// Last frame visible to this snapshot.
    pub fn max_frame(&self) -> u32 {
        self.header.mx_frame
    }

    /// Database size in pages recorded by the last commit.
    pub fn db_size(&self) -> u32 {
        self.header.n_page
    }

    pub fn commit_boundary(&self) -> u64 {
        self.header.commit_boundary()
    }

    /// Returns the latest visible frame holding `page_no`.
    pub fn find_frame(&mut self, page_no: u32) -> Result<Option<u32>, WalError> {
        let found = self
            .reader
            .index
            .find_frame(page_no, self.header.mx_frame)?;
        Ok(found)
    }

    /// Returns the latest visible image of `page_no`, or `None` if the WAL
    /// holds no visible frame for it.
    pub fn read_page(
        &mut self,
        page_no: u32,
    ) -> Result<Option<Vec<u8>>, WalError> {
        let Some(frame_no) = self.find_frame(page_no)? else {
            return Ok(None);
        };

        let page_size = self.header.page_size;
        let offset = frame_offset(frame_no, page_size);

        let mut buf = vec![0u8; FrameHeader::SIZE + page_size as usize];
        self.reader.file.read_at(offset, &mut buf).context(|| {
            format!("read frame {} at offset {}", frame_no, offset)
        })?;

        let fh = FrameHeader::decode(&buf[..FrameHeader::SIZE])?;
        if fh.page_no != page_no || fh.salts != self.header.salts {
            return Err(Corrupt::new(format!(
                "frame {} holds page {} with salts {:?}, index expects page {} with salts {:?}",
                frame_no, fh.page_no, fh.salts, page_no, self.header.salts
            ))
            .into());
        }

        buf.drain(..FrameHeader::SIZE);
        Ok(Some(buf))
    }
}
