//! The deposit orchestration engine.
//!
//! # Control flow
//!
//! ```text
//! submission event ──► SubmissionProcessor
//!                          │  claim (NOT_STARTED → IN_PROGRESS, CSE)
//!                          │  build DepositSubmission
//!                          └─► one Deposit per target ──► worker pool
//!                                                            │
//!                                              DepositTask (package,
//!                                              transmit, CSE updates)
//!                                                            │
//! deposit event ────► DepositProcessor ◄─────────────────────┘
//!                          │
//!            terminal ─────┴───── intermediate
//!               │                     │
//!       SubmissionAggregator   DepositStatusRefresher
//!               │                     │
//!      Submission ACCEPTED /   poll statusRef, settle
//!      REJECTED                Deposit + RepositoryCopy
//! ```
//!
//! Every entity write flows through the critical-section engine; uncaught
//! failures flow through the [`ErrorHandler`], which marks the referenced
//! entity FAILED iff it is not terminal.

pub mod aggregator;
pub mod builder;
pub mod context;
pub mod deposit;
pub mod drivers;
pub mod error_handler;
pub mod errors;
pub mod pool;
pub mod refresher;
pub mod submission;
pub mod task;

pub use aggregator::SubmissionAggregator;
pub use context::{EngineContext, EngineSettings};
pub use deposit::DepositProcessor;
pub use drivers::{DriverReport, RefreshDriver, RetryDriver};
pub use error_handler::ErrorHandler;
pub use errors::RemedialError;
pub use pool::{WorkerHandle, WorkerPool};
pub use refresher::DepositStatusRefresher;
pub use submission::SubmissionProcessor;
pub use task::DepositTask;
