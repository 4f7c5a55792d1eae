//! Interfaces at the seams of the WAL core: the log file it appends to and
//! the backends that provide shared-memory chunks.

pub mod chunk_backend;
pub mod log_file;
