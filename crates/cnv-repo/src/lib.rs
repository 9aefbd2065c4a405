//! Client for the upstream entity repository.
//!
//! The engine talks to the upstream exclusively through the
//! [`RepositoryClient`] trait: JSON-document CRUD with optimistic
//! concurrency. Writes are ETag-conditioned and a stale write surfaces as
//! [`RepoError::Conflict`] — the critical-section engine's retry loop is
//! built on that signal.
//!
//! [`HttpRepositoryClient`] is the production implementation. Tests use the
//! in-memory client from `cnv-testkit`, which honors the same ETag contract.

pub mod client;
pub mod error;
pub mod http;
pub mod typed;

pub use client::{IncomingLinks, RepositoryClient, VersionedValue};
pub use error::RepoError;
pub use http::{HttpRepositoryClient, HttpRepositoryConfig};
