//! Run sequencing for the weather ETL pipeline.
//!
//! A [`Pipeline`] is the explicit definition of one fetch → transform →
//! persist chain. The [`Driver`] triggers it, retries whole runs on
//! transient failures and raises an alert when retries run out.

pub mod driver;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod run;

pub use driver::{Driver, DriverReport, FailureNotifier, LogNotifier};
pub use error::RunError;
pub use pipeline::Pipeline;
pub use retry::{RetryDecision, RetryPolicy};
pub use run::{CompletedRun, RunOutcome, RunState};

pub use tokio_util::sync::CancellationToken;
