use std::format;

/// Configuration for a WAL and its shared-memory index.
///
/// Optional parameters are `Option<T>` in this struct, and default values is
/// evaluated when a getter method is called.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Path of the database file. The WAL, shm and lock files are derived
    /// from it by appending a suffix.
    pub path: String,

    /// Whether the index is shared with other processes through a mapped
    /// `-shm` file, instead of living in process-local heap memory.
    pub multi_process: Option<bool>,

    /// Whether checksum words of a newly created WAL are decoded as
    /// big-endian.
    pub big_endian_checksum: Option<bool>,

    /// Whether to sync the WAL header when it is rewritten for the first
    /// frame of an empty WAL, if the batch asks for any syncing at all.
    pub sync_wal_header: Option<bool>,
}

impl Config {
    /// Creates a new Config for the database at `path` with default values
    /// for other fields
    pub fn new(path: impl ToString) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    /// Returns whether the shm index is shared across processes (defaults to
    /// false)
    pub fn multi_process(&self) -> bool {
        self.multi_process.unwrap_or(false)
    }

    /// Returns whether new WALs use big-endian checksum words (defaults to
    /// the host byte order)
    pub fn big_endian_checksum(&self) -> bool {
        self.big_endian_checksum
            .unwrap_or(cfg!(target_endian = "big"))
    }

    /// Returns whether a freshly written WAL header is synced (defaults to
    /// true)
    pub fn sync_wal_header(&self) -> bool {
        self.sync_wal_header.unwrap_or(true)
    }

    /// Returns the path of the write-ahead log file: "{path}-wal"
    pub fn wal_path(&self) -> String {
        format!("{}-wal", self.path)
    }

    /// Returns the path of the file backing multi-process shared memory:
    /// "{path}-shm"
    pub fn shm_path(&self) -> String {
        format!("{}-shm", self.path)
    }

    /// Returns the path of the file whose exclusive lock is the WAL writer
    /// lock: "{path}-wal.lock"
    pub fn lock_path(&self) -> String {
        format!("{}-wal.lock", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn test_derived_paths() {
        let config = Config::new("/tmp/foo/main.db");

        assert_eq!(config.wal_path(), "/tmp/foo/main.db-wal");
        assert_eq!(config.shm_path(), "/tmp/foo/main.db-shm");
        assert_eq!(config.lock_path(), "/tmp/foo/main.db-wal.lock");
    }

    #[test]
    fn test_defaults() {
        let config = Config::new("x");

        assert!(!config.multi_process());
        assert!(config.sync_wal_header());
        assert_eq!(config.big_endian_checksum(), cfg!(target_endian = "big"));

        let config = Config {
            multi_process: Some(true),
            big_endian_checksum: Some(true),
            sync_wal_header: Some(false),
            ..Config::new("x")
        };

        assert!(config.multi_process());
        assert!(config.big_endian_checksum());
        assert!(!config.sync_wal_header());
    }
}
