//! Test doubles and fixtures for the deposit orchestration engine.
//!
//! [`InMemoryRepository`] honors the full `RepositoryClient` contract —
//! version-bumping ETags, conditional-write conflicts, incoming-link and
//! attribute queries — so the engine under test exercises the same
//! compare-and-swap paths it runs in production. Conflicts can additionally
//! be injected to drive the retry loop deterministically.
//!
//! The fakes in [`fakes`] stand in for packager components: a transport
//! that records sends and scripts its responses, a trivial assembler, and a
//! status processor with scripted outcomes.

pub mod fakes;
pub mod fixtures;
pub mod memory_repo;

pub use fakes::{FakeAssembler, FakeStatusProcessor, FakeTransport};
pub use memory_repo::InMemoryRepository;
