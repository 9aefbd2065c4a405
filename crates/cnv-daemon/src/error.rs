//! Daemon-level failure classes, mapped by the CLI onto exit codes.

#[derive(Debug)]
pub enum DaemonError {
    /// Bad deployment: missing env, malformed registry, unknown bindings.
    /// Exit code 1.
    Config(String),
    /// The upstream repository cannot be reached at startup. Exit code 2.
    Upstream(String),
    /// A runtime fault after successful startup. Exit code 3.
    Fault(anyhow::Error),
}

impl std::fmt::Display for DaemonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(detail) => write!(f, "configuration error: {detail}"),
            Self::Upstream(detail) => write!(f, "upstream repository unavailable: {detail}"),
            Self::Fault(cause) => write!(f, "runtime fault: {cause:#}"),
        }
    }
}

impl std::error::Error for DaemonError {}

impl From<cnv_config::ConfigError> for DaemonError {
    fn from(err: cnv_config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
