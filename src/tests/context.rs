use std::io;
use std::sync::Arc;

use tempfile::TempDir;

use crate::errors::WalError;
use crate::testing::FaultyFile;
use crate::testing::Faults;
use crate::testing::MemFile;
use crate::Config;
use crate::ShmDatabase;
use crate::Wal;
use crate::WalReader;

/// A database path in a fresh temporary directory and the shared-memory
/// state of that database.
pub(crate) struct TestContext {
    pub(crate) config: Config,

    pub(crate) db: Arc<ShmDatabase>,

    _temp_dir: TempDir,
}

impl TestContext {
    pub(crate) fn new() -> Result<TestContext, io::Error> {
        Self::with_config(|_| {})
    }

    pub(crate) fn with_config(
        f: impl FnOnce(&mut Config),
    ) -> Result<TestContext, io::Error> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("main.db");

        let mut config = Config::new(path.to_str().unwrap());
        f(&mut config);

        let db = ShmDatabase::open(&config)?;

        Ok(TestContext {
            config,
            db,
            _temp_dir: temp_dir,
        })
    }

    pub(crate) fn arc_config(&self) -> Arc<Config> {
        Arc::new(self.config.clone())
    }

    pub(crate) fn new_wal(&self) -> Result<Wal, WalError> {
        Wal::open(self.arc_config(), self.db.clone())
    }

    pub(crate) fn new_reader(&self) -> Result<WalReader, WalError> {
        WalReader::open(self.arc_config(), self.db.clone())
    }

    /// Opens a writer over an in-memory WAL whose operations can be made to
    /// fail.
    pub(crate) fn new_faulty_wal(
        &self,
        file: MemFile,
    ) -> Result<(Wal<FaultyFile<MemFile>>, Arc<Faults>), WalError> {
        let (f, faults) = FaultyFile::new(file);
        let wal = Wal::open_with_file(self.arc_config(), self.db.clone(), f)?;
        Ok((wal, faults))
    }

    pub(crate) fn new_mem_reader(
        &self,
        file: MemFile,
    ) -> WalReader<MemFile> {
        WalReader::open_with_file(self.arc_config(), self.db.clone(), file)
    }
}
