use std::fs::File;
use std::fs::OpenOptions;
use std::sync::Arc;

use codeq::error_context_ext::ErrorContextExt;
use fs2::FileExt;
use log::info;

use crate::errors::Busy;
use crate::errors::WalError;
use crate::Config;

/// The WAL writer lock: an exclusive lock on `{path}-wal.lock`.
///
/// Held by the single writer of a database for as long as it is open, and
/// briefly by a reader that has to rebuild an uninitialized index.
#[derive(Debug)]
pub(crate) struct WriterLock {
    config: Arc<Config>,
    f: File,
}

impl WriterLock {
    /// Takes the lock without blocking; `Busy` if someone else holds it.
    pub(crate) fn new(config: Arc<Config>) -> Result<Self, WalError> {
        let path = config.lock_path();

        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .context(|| format!("open WAL lock file '{}'", path))?;

        f.try_lock_exclusive().map_err(|e| {
            Busy::new(format!(
                "WAL writer lock '{}' is held by another writer; error:({})",
                path, e
            ))
        })?;

        info!("WAL writer lock acquired: {}", path);

        Ok(Self { config, f })
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.f);
        info!("WAL writer lock released: {}", self.config.lock_path());
    }
}
