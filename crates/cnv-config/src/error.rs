//! Configuration failure vocabulary.
//!
//! Everything here means "fix the deployment, not the code"; the CLI maps
//! these to exit code 1.

#[derive(Debug)]
pub enum ConfigError {
    MissingVar { name: &'static str },
    InvalidVar { name: &'static str, value: String, detail: String },
    UnreadableDocument { location: String, detail: String },
    MalformedDocument { location: String, detail: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVar { name } => write!(f, "required environment variable {name} is not set"),
            Self::InvalidVar { name, value, detail } => {
                write!(f, "environment variable {name}={value:?} is invalid: {detail}")
            }
            Self::UnreadableDocument { location, detail } => {
                write!(f, "cannot read registry document {location}: {detail}")
            }
            Self::MalformedDocument { location, detail } => {
                write!(f, "registry document {location} is malformed: {detail}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
