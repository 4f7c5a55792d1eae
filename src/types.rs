pub use codeq::config::Crc32fast;

/// A byte range in the WAL file.
pub type Segment = codeq::Segment<Crc32fast>;

/// One dirty page handed to the WAL writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Database page number, starting from 1.
    pub page_no: u32,

    /// The full page image, exactly `page_size` bytes.
    pub data: Vec<u8>,
}

impl Page {
    pub fn new(page_no: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            page_no,
            data: data.into(),
        }
    }
}

/// How hard to push written frames to stable storage when a batch commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Leave it to the OS.
    None,

    /// Sync file data.
    #[default]
    Normal,

    /// Sync file data and metadata.
    Full,
}
