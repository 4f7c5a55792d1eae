use std::sync::Arc;

use codeq::error_context_ext::ErrorContextExt;
use log::debug;
use log::error;
use log::info;
use log::warn;

use crate::api::log_file::LogFile;
use crate::disk_file::DiskFile;
use crate::errors::Corrupt;
use crate::errors::InvalidInput;
use crate::errors::WalError;
use crate::file_lock::WriterLock;
use crate::shm::ShmConnection;
use crate::shm::ShmDatabase;
use crate::types::Page;
use crate::types::Segment;
use crate::types::SyncPolicy;
use crate::wal::checksum::WalChecksum;
use crate::wal::commit_state::CommitEvent;
use crate::wal::commit_state::CommitState;
use crate::wal::commit_state::Failure;
use crate::wal::frame_writer::FrameWriter;
use crate::wal::recovery::read_wal_header;
use crate::wal::recovery::recover_index;
use crate::wal::stat::WalStat;
use crate::wal::wal_header::validate_page_size;
use crate::wal::wal_header::WalHeader;
use crate::wal::wal_index::IndexHeader;
use crate::wal::wal_index::WalIndex;
use crate::Config;

/// The writer side of a WAL.
///
/// Holds the WAL writer lock for its whole lifetime, so there is at most one
/// `Wal` per database. Frames are appended with [`Wal::write_frames`]; a
/// commit batch makes them, and every pending frame before them, visible to
/// readers at once by publishing a new WAL index header.
///
/// A corruption detected while writing poisons the writer: every later
/// batch fails with `Corrupt` until the WAL is reopened.
#[derive(Debug)]
pub struct Wal<F = DiskFile>
where F: LogFile
{
    config: Arc<Config>,

    writer: FrameWriter<F>,

    /// The index header this writer last published or loaded.
    published: IndexHeader,

    state: CommitState,

    frames_written: u64,
    commits: u64,
    failures: u64,

    _writer_lock: WriterLock,
}

impl Wal<DiskFile> {
    /// Opens the WAL at [`Config::wal_path`], creating it if absent.
    pub fn open(
        config: Arc<Config>,
        db: Arc<ShmDatabase>,
    ) -> Result<Self, WalError> {
        let lock = WriterLock::new(config.clone())?;
        let file = DiskFile::open(config.wal_path())?;
        Self::load(config, db, file, lock)
    }
}

impl<F> Wal<F>
where F: LogFile
{
    /// Opens a WAL stored in `file`.
    pub fn open_with_file(
        config: Arc<Config>,
        db: Arc<ShmDatabase>,
        file: F,
    ) -> Result<Self, WalError> {
        let lock = WriterLock::new(config.clone())?;
        Self::load(config, db, file, lock)
    }

    fn load(
        config: Arc<Config>,
        db: Arc<ShmDatabase>,
        file: F,
        lock: WriterLock,
    ) -> Result<Self, WalError> {
        let mut index = WalIndex::new(ShmConnection::shared(db));

        let trusted = match index.read_header() {
            Ok(h) => h,
            Err(e @ (WalError::Busy(_) | WalError::Corrupt(_))) => {
                warn!("WAL index header is unusable, rebuilding it: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        let (wal_header, published) = match trusted {
            Some(h) => (Self::check_wal_header(&file, &h)?, h),
            None => {
                let r = recover_index(&file, &mut index, 0, None)?;
                (r.wal_header, r.index_header)
            }
        };

        info!(
            "Opened WAL '{}': page_size: {}, mx_frame: {}, commit_boundary: {}",
            config.wal_path(),
            published.page_size,
            published.mx_frame,
            published.commit_boundary()
        );

        let writer = FrameWriter::new(file, index, wal_header, &published);

        Ok(Self {
            config,
            writer,
            published,
            state: CommitState::Idle,
            frames_written: 0,
            commits: 0,
            failures: 0,
            _writer_lock: lock,
        })
    }

    /// Reads the WAL header and checks that a trusted index header describes
    /// the same WAL generation.
    fn check_wal_header(
        file: &F,
        h: &IndexHeader,
    ) -> Result<Option<WalHeader>, WalError> {
        let wal_header = match read_wal_header(file) {
            Ok(x) => x,
            Err(WalError::Corrupt(_)) if h.mx_frame == 0 => None,
            Err(e) => return Err(e),
        };

        if h.mx_frame == 0 {
            return Ok(wal_header);
        }

        match wal_header {
            Some(wh) if wh.salts == h.salts && wh.page_size == h.page_size => {
                Ok(Some(wh))
            }
            _ => Err(Corrupt::new(format!(
                "WAL index with mx_frame {} does not match the WAL header {:?}",
                h.mx_frame, wal_header
            ))
            .into()),
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    /// Appends `pages` as frames and, if `is_commit`, commits them together
    /// with every pending frame.
    ///
    /// For a commit the last frame records `truncate_size`, the database size
    /// in pages after the transaction. `sync` decides how the frames are
    /// made durable before the commit is published.
    ///
    /// Returns the byte range of the WAL written by this batch. On error the
    /// commit boundary is unchanged and the frames of this batch are
    /// discarded; frames pending from earlier non-commit batches are kept.
    pub fn write_frames(
        &mut self,
        page_size: u32,
        pages: &[Page],
        truncate_size: u64,
        is_commit: bool,
        sync: SyncPolicy,
    ) -> Result<Segment, WalError> {
        self.validate(page_size, pages, truncate_size, is_commit)?;

        self.transition(CommitEvent::Begin)?;

        let batch_start = (self.writer.frames(), self.writer.checksum());

        match self.write_batch(page_size, pages, truncate_size, is_commit, sync)
        {
            Ok(seg) => {
                self.transition(CommitEvent::Written { is_commit })?;
                Ok(seg)
            }
            Err(e) => Err(self.fail(e, batch_start)),
        }
    }

    fn validate(
        &self,
        page_size: u32,
        pages: &[Page],
        truncate_size: u64,
        is_commit: bool,
    ) -> Result<(), InvalidInput> {
        if pages.is_empty() {
            return Err(InvalidInput::new("empty batch"));
        }

        validate_page_size(page_size)?;

        if self.writer.frames() > 0 {
            if let Some(wh) = self.writer.wal_header() {
                if wh.page_size != page_size {
                    return Err(InvalidInput::new(format!(
                        "page size {} differs from the WAL page size {}",
                        page_size, wh.page_size
                    )));
                }
            }
        }

        for p in pages {
            if p.page_no == 0 {
                return Err(InvalidInput::new("page number 0"));
            }
            if p.data.len() != page_size as usize {
                return Err(InvalidInput::new(format!(
                    "page {} has {} bytes, expected {}",
                    p.page_no,
                    p.data.len(),
                    page_size
                )));
            }
        }

        if is_commit && (truncate_size == 0 || truncate_size > u32::MAX as u64)
        {
            return Err(InvalidInput::new(format!(
                "commit database size must be in [1, {}], got {}",
                u32::MAX,
                truncate_size
            )));
        }

        let total = self.writer.frames() as u64 + pages.len() as u64;
        if total > u32::MAX as u64 {
            return Err(InvalidInput::new(format!(
                "WAL would hold {} frames, more than {}",
                total,
                u32::MAX
            )));
        }

        Ok(())
    }

    fn write_batch(
        &mut self,
        page_size: u32,
        pages: &[Page],
        truncate_size: u64,
        is_commit: bool,
        sync: SyncPolicy,
    ) -> Result<Segment, WalError> {
        self.check_index()?;

        let start = self.writer.tail_offset();

        if self.writer.frames() == 0 {
            let header_sync = if self.config.sync_wal_header() {
                sync
            } else {
                SyncPolicy::None
            };
            self.writer.start_wal(
                page_size,
                self.config.big_endian_checksum(),
                header_sync,
            )?;
        }

        let last = pages.len() - 1;
        for (i, page) in pages.iter().enumerate() {
            let db_size = if is_commit && i == last {
                truncate_size as u32
            } else {
                0
            };

            self.writer.append(page, db_size)?;
            self.frames_written += 1;
        }

        if is_commit {
            self.writer
                .sync(sync)
                .context(|| format!("sync WAL for commit, {:?}", sync))?;

            let Some(wh) = self.writer.wal_header().copied() else {
                return Err(Corrupt::new("commit without a WAL header").into());
            };

            let hdr = IndexHeader {
                change: self.published.change.wrapping_add(1),
                big_endian: wh.big_endian(),
                page_size,
                mx_frame: self.writer.frames(),
                n_page: truncate_size as u32,
                frame_checksum: self.writer.checksum(),
                salts: wh.salts,
            };

            self.writer.index_mut().write_header(&hdr)?;
            self.published = hdr;
            self.commits += 1;

            debug!(
                "Committed: mx_frame: {}, n_page: {}, commit_boundary: {}",
                hdr.mx_frame,
                hdr.n_page,
                hdr.commit_boundary()
            );
        }

        let end = self.writer.tail_offset();
        Ok(Segment::new(start, end - start))
    }

    /// The index header must still be the one this writer published.
    fn check_index(&mut self) -> Result<(), WalError> {
        let found = match self.writer.index_mut().read_header() {
            Ok(h) => h,
            Err(WalError::Busy(_)) => {
                return Err(Corrupt::new(
                    "WAL index header copies differ while the writer lock is held",
                )
                .into());
            }
            Err(e) => return Err(e),
        };

        if found != Some(self.published) {
            return Err(Corrupt::new(format!(
                "WAL index header changed under the writer: expected {:?}, found {:?}",
                self.published, found
            ))
            .into());
        }

        Ok(())
    }

    fn transition(&mut self, event: CommitEvent) -> Result<(), WalError> {
        match self.state.next(event) {
            Some(s) => {
                self.state = s;
                Ok(())
            }
            None if self.state.is_poisoned() => Err(Corrupt::new(
                "WAL writer stopped after a corruption, reopen it",
            )
            .into()),
            None => Err(InvalidInput::new(format!(
                "{:?} is not allowed in state {}",
                event, self.state
            ))
            .into()),
        }
    }

    /// Classifies a failed batch, discards the frames of that batch and
    /// returns the error.
    ///
    /// `batch_start` is the frame count and chain checksum the batch started
    /// from; frames pending from earlier batches are kept.
    fn fail(
        &mut self,
        e: WalError,
        batch_start: (u32, WalChecksum),
    ) -> WalError {
        let failure = if e.is_fatal() {
            Failure::Fatal
        } else {
            Failure::Retryable
        };

        self.failures += 1;

        error!(
            "write_frames failed, {}; commit boundary stays at frame {}: {}",
            failure, self.published.mx_frame, e
        );

        if let Some(s) = self.state.next(CommitEvent::Fail(failure)) {
            self.state = s;
        }

        if failure == Failure::Retryable {
            let (frames, checksum) = batch_start;
            self.writer.rewind(frames, checksum);
            self.cut_tail();
        }

        e
    }

    /// Cuts the file at the writer position.
    fn cut_tail(&mut self) {
        let tail = self.writer.tail_offset();
        if let Err(e) = self.writer.truncate(tail) {
            warn!(
                "Failed to truncate WAL to {} bytes, \
                stale frames are overwritten by the next batch: {}",
                tail, e
            );
        }
    }

    /// Discards the frames written by non-commit batches since the last
    /// commit.
    pub fn rollback(&mut self) -> Result<(), WalError> {
        self.transition(CommitEvent::Rollback)?;

        let discarded = self.writer.frames() - self.published.mx_frame;
        self.writer.reset_to(&self.published);
        self.cut_tail();

        info!(
            "Rolled back {} pending frames, mx_frame: {}",
            discarded, self.published.mx_frame
        );
        Ok(())
    }

    /// End of the last commit frame in the WAL file.
    pub fn commit_boundary(&self) -> u64 {
        self.published.commit_boundary()
    }

    /// Last frame of the last commit.
    pub fn max_frame(&self) -> u32 {
        self.published.mx_frame
    }

    /// Frames written by non-commit batches and not yet committed.
    pub fn pending_frames(&self) -> u32 {
        self.writer.frames() - self.published.mx_frame
    }

    pub fn state(&self) -> CommitState {
        self.state
    }

    /// The WAL file, for inspection.
    pub fn file(&self) -> &F {
        self.writer.file()
    }

    pub fn stat(&self) -> WalStat {
        WalStat {
            state: self.state,
            page_size: self.published.page_size,
            max_frame: self.published.mx_frame as u64,
            pending_frames: self.pending_frames() as u64,
            commit_boundary: self.commit_boundary(),
            frames_written: self.frames_written,
            commits: self.commits,
            failures: self.failures,
            shm: self.writer.index().connection().database().stat(),
        }
    }
}
