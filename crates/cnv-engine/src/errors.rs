//! Typed errors the engine distinguishes by kind.

/// Human intervention is required; automated retry will not help and no
/// entity state should change. The error handler logs these loudly and
/// leaves the referenced entity exactly as it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemedialError {
    pub detail: String,
}

impl RemedialError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for RemedialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "remedial condition, operator action required: {}", self.detail)
    }
}

impl std::error::Error for RemedialError {}
