use std::io;
use std::io::stdout;
use std::path::PathBuf;

use clap::Parser;
use shm_wal::Dump;

#[derive(Clone, Debug, PartialEq, Eq, clap::Parser)]
#[clap(about = "dump the frames of a WAL file", author)]
pub struct Args {
    /// Path of the WAL file, usually `<database>-wal`
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

fn main() -> Result<(), io::Error> {
    let args = Args::parse();

    let dump = Dump::wal_file(args.path.display());
    dump.write(stdout().lock())?;

    Ok(())
}
