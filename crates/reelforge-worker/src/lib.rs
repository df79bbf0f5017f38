//! The Processing Orchestrator: the six-phase state machine that drives a
//! `VideoSpec` to a finished `VideoRun`, plus the supporting retry policy,
//! recovery planner, sync verifier, and the job executor that pulls work
//! off `reelforge-queue` under the single-active-worker lock.

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod orchestrator;
pub mod recovery;
pub mod retry;
pub mod sync;

pub use config::WorkerConfig;
pub use error::{Classification, WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use orchestrator::{Orchestrator, Services};
pub use recovery::{RecoveryAction, RecoveryInputs, RecoveryPlanner};
pub use retry::RetryPolicy;
