//! Triggering, retry and alerting around a [`Pipeline`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use weatherflow_store::WeatherSink;

use crate::error::RunError;
use crate::pipeline::Pipeline;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::run::RunOutcome;

/// Receives the final failure of a trigger once retries are exhausted.
pub trait FailureNotifier: Send + Sync {
    fn run_failed(&self, pipeline_id: &str, attempts: u32, error: &RunError);
}

/// Reports exhausted runs through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl FailureNotifier for LogNotifier {
    fn run_failed(&self, pipeline_id: &str, attempts: u32, error: &RunError) {
        tracing::error!(
            pipeline = pipeline_id,
            attempts,
            "Pipeline failed: {} ({})",
            error,
            error.user_message()
        );
    }
}

/// What one trigger did.
#[derive(Debug)]
pub struct DriverReport {
    pub pipeline_id: String,
    /// Runs executed, including the first
    pub attempts: u32,
    /// Outcome of the last run
    pub outcome: RunOutcome,
}

impl DriverReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Clears the in-flight flag however the trigger ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs a pipeline on demand or on a fixed interval, one run at a time.
pub struct Driver<S> {
    pipeline: Pipeline<S>,
    retry: RetryPolicy,
    notifier: Box<dyn FailureNotifier>,
    running: AtomicBool,
}

impl<S: WeatherSink> Driver<S> {
    pub fn new(pipeline: Pipeline<S>, retry: RetryPolicy) -> Self {
        Self {
            pipeline,
            retry,
            notifier: Box::new(LogNotifier),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_notifier(mut self, notifier: impl FailureNotifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn pipeline(&self) -> &Pipeline<S> {
        &self.pipeline
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run the pipeline, retrying whole runs on transient failures.
    ///
    /// Returns `None` without running if a previous trigger is still in
    /// flight. The notifier fires once per trigger whose final run failed
    /// with no retry left. Cancellation, whether mid-run or during the
    /// backoff, never alerts.
    pub async fn trigger(&self, cancel: &CancellationToken) -> Option<DriverReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(pipeline = self.pipeline.id(), "Run already in flight, skipping trigger");
            return None;
        }
        let _guard = RunningGuard(&self.running);

        let mut attempts = 0;
        let mut cancelled = false;
        let outcome = loop {
            attempts += 1;
            let outcome = self.pipeline.run(cancel).await;

            let Some(error) = outcome.error() else {
                if attempts > 1 {
                    tracing::info!("Run succeeded after {} attempts", attempts);
                }
                break outcome;
            };

            if self.retry.decide(error, attempts) == RetryDecision::NoRetry {
                break outcome;
            }

            let delay = self.retry.delay_for_attempt(attempts);
            tracing::warn!(
                "Attempt {} of {} failed, retrying in {:?}",
                attempts,
                self.retry.max_attempts(),
                delay
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Cancelled while waiting to retry");
                    cancelled = true;
                    break outcome;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        };

        match outcome.error() {
            Some(RunError::Cancelled) | None => {}
            Some(_) if cancelled => {}
            Some(error) => self.notifier.run_failed(self.pipeline.id(), attempts, error),
        }

        Some(DriverReport {
            pipeline_id: self.pipeline.id().to_string(),
            attempts,
            outcome,
        })
    }

    /// Trigger immediately, then every `interval` until `cancel` fires.
    ///
    /// Ticks that fall due while a run is still going are skipped rather than
    /// queued. Returns the number of triggers executed.
    pub async fn run_every(&self, interval: Duration, cancel: &CancellationToken) -> u64 {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            pipeline = self.pipeline.id(),
            "Triggering every {:?}",
            interval
        );

        let mut triggers = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.trigger(cancel).await.is_some() {
                triggers += 1;
            }
        }

        tracing::info!(pipeline = self.pipeline.id(), "Stopped after {} triggers", triggers);
        triggers
    }
}
