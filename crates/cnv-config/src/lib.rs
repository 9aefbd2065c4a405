//! Process configuration: environment settings and the target registry
//! document.
//!
//! The registry document (JSON or YAML) enumerates every configured target;
//! it is fetched once at startup from `ORCH_REPOSITORY_CONFIGURATION`,
//! canonicalized, and hashed so operators can confirm which configuration a
//! running daemon carries.

pub mod env;
pub mod error;
pub mod registry_doc;

pub use env::Settings;
pub use error::ConfigError;
pub use registry_doc::{load_registry, LoadedRegistry};
