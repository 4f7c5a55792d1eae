use std::io;
use std::sync::Arc;

use indoc::indoc;
use pretty_assertions::assert_eq;
use shm_wal::Config;
use shm_wal::Dump;
use shm_wal::Page;
use shm_wal::ShmDatabase;
use shm_wal::SyncPolicy;
use shm_wal::Wal;

#[test]
fn test_dump_wal_file() -> Result<(), io::Error> {
    let temp_dir = tempfile::tempdir()?;
    let path = temp_dir.path().join("main.db");

    let mut config = Config::new(path.to_str().unwrap());
    config.big_endian_checksum = Some(true);
    let config = Arc::new(config);

    {
        let db = ShmDatabase::open(&config)?;
        let mut wal = Wal::open(config.clone(), db)?;

        let pages = [Page::new(1, vec![1; 512]), Page::new(2, vec![2; 512])];
        wal.write_frames(512, &pages, 2, true, SyncPolicy::Normal)?;

        let pages = [Page::new(3, vec![3; 512])];
        wal.write_frames(512, &pages, 0, false, SyncPolicy::Normal)?;
    }

    let got = Dump::new(&config).write_to_string()?;
    assert_eq!(
        indoc! {r#"
        WAL(page_size: 512, checkpoint_seq: 0, checksum: be)
          F-00001: [000_000_032, 000_000_568) page: 1, commit: 0
          F-00002: [000_000_568, 000_001_104) page: 2, commit: 2
          F-00003: [000_001_104, 000_001_640) page: 3, commit: 0
        "#},
        got
    );

    Ok(())
}

#[test]
fn test_dump_missing_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("missing-wal");

    let e = Dump::wal_file(path.display()).write_to_string().unwrap_err();
    assert_eq!(io::ErrorKind::NotFound, e.kind());
}
