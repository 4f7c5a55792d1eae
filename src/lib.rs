//! Write-ahead log with a shared-memory index:
//! the frame-commit path of a WAL-mode page store.
//!
//! ## Features
//!
//! - Dirty pages are appended as frames whose checksums chain from the WAL
//!   header through every frame, so a torn or stale tail is detected.
//! - A batch either commits as a whole or leaves the commit boundary where
//!   it was; readers only ever see committed frames.
//! - The frame-to-page index lives in 32 KiB shared-memory chunks that grow
//!   on demand and are never moved while referenced, shared by the
//!   connections of one process ([`ShmMode::SingleProcess`]), by several
//!   processes through a mapped `-shm` file ([`ShmMode::MultiProcess`]), or
//!   private to one read-only connection ([`ShmMode::ReadOnlySnapshot`]).
//! - After a crash the index is rebuilt from the WAL file, keeping every
//!   frame up to the last valid commit.
//!
//! ## Example
//!
//! ```rust
//! # use std::sync::Arc;
//! use shm_wal::{Config, Page, ShmDatabase, SyncPolicy, Wal, WalReader};
//!
//! let temp_dir = tempfile::tempdir().unwrap();
//! let path = temp_dir.path().join("main.db");
//! let config = Arc::new(Config::new(path.to_str().unwrap()));
//!
//! let db = ShmDatabase::open(&config).unwrap();
//! let mut wal = Wal::open(config.clone(), db.clone()).unwrap();
//!
//! // Page 1 and 2 in one transaction; the database is 2 pages long after it.
//! let pages = vec![Page::new(1, vec![1u8; 512]), Page::new(2, vec![2u8; 512])];
//! wal.write_frames(512, &pages, 2, true, SyncPolicy::Normal).unwrap();
//!
//! let mut reader = WalReader::open(config, db).unwrap();
//! let mut snapshot = reader.begin_read().unwrap();
//! assert_eq!(2, snapshot.max_frame());
//! assert_eq!(Some(vec![2u8; 512]), snapshot.read_page(2).unwrap());
//! ```

mod config;
mod disk_file;
mod shm;
mod wal;

pub(crate) mod file_lock;
pub(crate) mod num;

#[cfg(test)]
pub(crate) mod testing;

pub mod types;
pub use codeq;

pub mod api;
pub mod dump_writer;
pub mod errors;

pub use config::Config;
pub use disk_file::DiskFile;
pub use shm::DatabaseMode;
pub use shm::HeapBackend;
pub use shm::MappedBackend;
pub use shm::ShmChunk;
pub use shm::ShmConnection;
pub use shm::ShmDatabase;
pub use shm::ShmMode;
pub use shm::ShmStat;
pub use shm::SHM_CHUNK_SIZE;
pub use types::Page;
pub use types::SyncPolicy;

pub use self::wal::checksum::WalChecksum;
pub use self::wal::commit_state::CommitEvent;
pub use self::wal::commit_state::CommitState;
pub use self::wal::commit_state::Failure;
pub use self::wal::dump::Dump;
pub use self::wal::frame::FrameHeader;
pub use self::wal::frame_iter::FrameEntry;
pub use self::wal::reader::ReadSnapshot;
pub use self::wal::reader::WalReader;
pub use self::wal::stat::WalStat;
pub use self::wal::wal::Wal;
pub use self::wal::wal_header::Salts;
pub use self::wal::wal_header::WalHeader;
pub use self::wal::wal_index::IndexHeader;
pub use self::wal::wal_index::WalIndex;
pub use crate::types::Segment;

#[cfg(test)]
mod tests;
