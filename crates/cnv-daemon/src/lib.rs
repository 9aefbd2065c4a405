//! The `listen` runtime.
//!
//! Wires the engine to the outside world: an HTTP surface for event ingress
//! and operational status, listener pools that drain the ingress queue into
//! the processors, a periodic refresh job, and signal-driven drain-and-exit.
//! The router is built separately from the middleware so the scenario tests
//! can compose it directly.

pub mod bootstrap;
pub mod error;
pub mod ingress;
pub mod routes;
pub mod runtime;
pub mod state;

pub use bootstrap::{bootstrap, Runtime};
pub use error::DaemonError;
pub use runtime::run;
pub use state::AppState;
