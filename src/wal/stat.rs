use std::fmt;
use std::fmt::Formatter;

use crate::num::format_pad9_u64;
use crate::shm::ShmStat;
use crate::wal::commit_state::CommitState;

/// Statistics about a WAL writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalStat {
    pub state: CommitState,
    /// Page size of the current WAL, 0 if none was written yet
    pub page_size: u32,
    /// Last frame of the last published commit
    pub max_frame: u64,
    /// Frames written by non-commit batches, not yet published
    pub pending_frames: u64,
    /// End of the last commit frame in the WAL file
    pub commit_boundary: u64,
    /// Frames written since open, discarded ones included
    pub frames_written: u64,
    pub commits: u64,
    pub failures: u64,
    pub shm: ShmStat,
}

impl fmt::Display for WalStat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let lb = if f.alternate() { "\n" } else { "" };
        write!(
            f,
            "WalStat{{{lb} state: {}, page_size: {},{lb} \
            max_frame: {}, pending_frames: {}, commit_boundary: {},{lb} \
            frames_written: {}, commits: {}, failures: {},{lb} \
            shm: {}{lb}\
            }}",
            self.state,
            self.page_size,
            format_pad9_u64(self.max_frame),
            format_pad9_u64(self.pending_frames),
            format_pad9_u64(self.commit_boundary),
            format_pad9_u64(self.frames_written),
            format_pad9_u64(self.commits),
            format_pad9_u64(self.failures),
            self.shm,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::WalStat;
    use crate::shm::ShmMode;
    use crate::shm::ShmStat;
    use crate::wal::commit_state::CommitState;

    #[test]
    fn test_display() {
        let stat = WalStat {
            state: CommitState::Committed,
            page_size: 512,
            max_frame: 3,
            pending_frames: 0,
            commit_boundary: 1640,
            frames_written: 4,
            commits: 2,
            failures: 1,
            shm: ShmStat {
                mode: ShmMode::SingleProcess,
                published_chunks: 1,
                backend_allocations: 1,
            },
        };

        assert_eq!(
            "WalStat{ state: Committed, page_size: 512, \
            max_frame: 000_000_003, pending_frames: 000_000_000, commit_boundary: 000_001_640, \
            frames_written: 000_000_004, commits: 000_000_002, failures: 000_000_001, \
            shm: ShmStat{mode: single-process, published_chunks: 000_000_001, backend_allocations: 000_000_001}\
            }",
            stat.to_string()
        );
    }
}
