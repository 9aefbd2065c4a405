//! Typed failure vocabulary for upstream repository access.
//!
//! Callers match on kinds: a `Conflict` drives the critical-section retry
//! loop, a `Malformed` entity is skipped during aggregation, everything else
//! propagates as a failure of the surrounding operation.

/// Why an upstream repository operation failed.
#[derive(Debug)]
pub enum RepoError {
    /// The ETag-conditioned write lost the race: the entity changed upstream
    /// since it was read.
    Conflict { id: String },
    /// The entity addressed by a write no longer exists.
    NotFound { id: String },
    /// The upstream answered with an unexpected HTTP status.
    Http { status: u16, detail: String },
    /// Connection-level failure (reset, timeout, DNS).
    Io { detail: String },
    /// The upstream returned a document this client cannot interpret.
    Malformed { id: String, detail: String },
}

impl RepoError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

impl std::fmt::Display for RepoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict { id } => write!(f, "conditional write conflict on {id}"),
            Self::NotFound { id } => write!(f, "entity not found: {id}"),
            Self::Http { status, detail } => {
                write!(f, "upstream returned HTTP {status}: {detail}")
            }
            Self::Io { detail } => write!(f, "upstream I/O failure: {detail}"),
            Self::Malformed { id, detail } => {
                write!(f, "malformed entity document {id}: {detail}")
            }
        }
    }
}

impl std::error::Error for RepoError {}

impl From<reqwest::Error> for RepoError {
    fn from(err: reqwest::Error) -> Self {
        Self::Io {
            detail: err.to_string(),
        }
    }
}
