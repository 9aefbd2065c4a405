//! Wire transports for deposit packages.
//!
//! Two reference backends live here, one per protocol value the registry
//! document can bind:
//!
//! - `filesystem` — [`FilesystemTransport`] writes the package under the
//!   target's `default-directory`. Acceptance is synchronous: landing the
//!   bytes *is* custody.
//! - `http` — [`HttpDepositTransport`] posts the package to the target's
//!   `default-collection` URL and parses a JSON receipt, which may carry a
//!   statement URL for asynchronous acceptance.
//!
//! [`LocationRetriever`] resolves manifest byte locations (`http(s)://`,
//! `file://`) for the assembler.

pub mod fs;
pub mod http;
pub mod retrieve;

pub use fs::FilesystemTransport;
pub use http::HttpDepositTransport;
pub use retrieve::LocationRetriever;
