use std::fmt;

/// How bad a failed batch was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The batch may be retried: out of memory, I/O, busy.
    Retryable,

    /// The WAL or its index is corrupt; the writer refuses further batches.
    Fatal,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Retryable => write!(f, "retryable"),
            Failure::Fatal => write!(f, "fatal"),
        }
    }
}

/// State of the writer in the frame commit protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitState {
    /// No batch in progress. Frames of earlier non-commit batches may be
    /// pending.
    #[default]
    Idle,

    /// A batch is being written.
    Writing,

    /// The last batch committed and moved the commit boundary.
    Committed,

    Failed(Failure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitEvent {
    /// A batch starts.
    Begin,

    /// Every frame of the batch is written; for a commit batch the index
    /// header is published too.
    Written { is_commit: bool },

    Fail(Failure),

    /// Pending frames are discarded.
    Rollback,
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitState::Idle => write!(f, "Idle"),
            CommitState::Writing => write!(f, "Writing"),
            CommitState::Committed => write!(f, "Committed"),
            CommitState::Failed(failure) => write!(f, "Failed({})", failure),
        }
    }
}

impl CommitState {
    /// Returns the state after `event`, or `None` if the event is not
    /// allowed in this state.
    pub fn next(self, event: CommitEvent) -> Option<CommitState> {
        use CommitEvent as E;
        use CommitState as S;

        let next = match (self, event) {
            (S::Failed(Failure::Fatal), _) => return None,

            (S::Idle | S::Committed | S::Failed(_), E::Begin) => S::Writing,

            (S::Writing, E::Written { is_commit: true }) => S::Committed,
            (S::Writing, E::Written { is_commit: false }) => S::Idle,
            (S::Writing, E::Fail(failure)) => S::Failed(failure),

            (S::Idle | S::Committed | S::Failed(_), E::Rollback) => S::Idle,

            _ => return None,
        };

        Some(next)
    }

    pub fn is_poisoned(&self) -> bool {
        matches!(self, CommitState::Failed(Failure::Fatal))
    }
}
