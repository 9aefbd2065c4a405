//! Critical-Section Engine — the single write path to the upstream store.
//!
//! # Design
//!
//! Many independent agents (listener pools, deposit workers, operator
//! drivers, and other deployments of this daemon) mutate the same entities.
//! Correctness rests on two mechanisms, layered:
//!
//! 1. **ETag compare-and-swap.** Every write is conditioned on the version
//!    read at the start of the attempt; a stale write comes back as a
//!    conflict and the whole attempt — read, pre-condition, critical
//!    function, write — is retried against fresh state, up to a fixed bound.
//!    This alone linearizes mutations per entity.
//! 2. **Process-local keyed mutex.** Within one process, attempts against
//!    the same entity identifier serialize before they ever reach the
//!    upstream. Not required for correctness, but a burst of events about
//!    one entity would otherwise turn into a conflict-retry storm.
//!
//! [`CriticalEngine::perform_critical`] never returns `Err` and never
//! panics on payload failures: every outcome — performed, pre-condition
//! miss, conflict bound exhausted, post-condition violation, payload error —
//! is carried in [`CriticalResult`]. A pre-condition miss is a *normal*
//! outcome (another agent already advanced the entity), not an error.

pub mod engine;
pub mod keyed_mutex;
pub mod result;

pub use engine::{CriticalEngine, RetrySettings};
pub use keyed_mutex::KeyedMutex;
pub use result::{CriticalOutcome, CriticalResult};
