//! Per-run state tracking.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use weatherflow_weather::WeatherRecord;

use crate::error::RunError;

/// Lifecycle of a single run.
///
/// `Idle → Fetching → Transforming → Persisting → Succeeded`; any working
/// state may move to `Failed`. Both end states are terminal for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Idle,
    Fetching,
    Transforming,
    Persisting,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Transforming => "transforming",
            Self::Persisting => "persisting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful run wrote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletedRun {
    pub record: WeatherRecord,
    pub row_id: i64,
}

/// Result of one run, with every state it passed through.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub states: Vec<RunState>,
    pub result: Result<CompletedRun, RunError>,
}

impl RunOutcome {
    /// Final state: `Succeeded` or `Failed`.
    pub fn state(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Idle)
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&RunError> {
        self.result.as_ref().err()
    }

    /// Whether the run got as far as `state`.
    pub fn reached(&self, state: RunState) -> bool {
        self.states.contains(&state)
    }
}

/// Records transitions while a run is in flight.
#[derive(Debug)]
pub(crate) struct RunTracker {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    states: Vec<RunState>,
}

impl RunTracker {
    pub(crate) fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            states: vec![RunState::Idle],
        }
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub(crate) fn current(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Idle)
    }

    pub(crate) fn advance(&mut self, next: RunState) {
        tracing::debug!(run_id = %self.run_id, "{} -> {}", self.current(), next);
        self.states.push(next);
    }

    pub(crate) fn fail(mut self, error: RunError) -> RunOutcome {
        tracing::warn!(
            run_id = %self.run_id,
            stage = %self.current(),
            retryable = error.is_retryable(),
            "Run failed: {}",
            error
        );
        self.states.push(RunState::Failed);
        self.finish(Err(error))
    }

    pub(crate) fn succeed(mut self, completed: CompletedRun) -> RunOutcome {
        self.states.push(RunState::Succeeded);
        self.finish(Ok(completed))
    }

    fn finish(self, result: Result<CompletedRun, RunError>) -> RunOutcome {
        RunOutcome {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            states: self.states,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> WeatherRecord {
        WeatherRecord {
            latitude: 51.5074,
            longitude: -0.1278,
            temperature: 15.2,
            windspeed: 15.2,
            winddirection: 200.0,
            weathercode: 3,
        }
    }

    #[test]
    fn test_successful_run_states() {
        let mut tracker = RunTracker::start();
        tracker.advance(RunState::Fetching);
        tracker.advance(RunState::Transforming);
        tracker.advance(RunState::Persisting);
        let outcome = tracker.succeed(CompletedRun {
            record: record(),
            row_id: 1,
        });

        assert_eq!(
            outcome.states,
            vec![
                RunState::Idle,
                RunState::Fetching,
                RunState::Transforming,
                RunState::Persisting,
                RunState::Succeeded,
            ]
        );
        assert_eq!(outcome.state(), RunState::Succeeded);
        assert!(outcome.is_success());
        assert!(outcome.finished_at >= outcome.started_at);
    }

    #[test]
    fn test_failed_run_stops_at_failing_stage() {
        let mut tracker = RunTracker::start();
        tracker.advance(RunState::Fetching);
        let outcome = tracker.fail(RunError::Cancelled);

        assert_eq!(outcome.states, vec![RunState::Idle, RunState::Fetching, RunState::Failed]);
        assert_eq!(outcome.state(), RunState::Failed);
        assert!(!outcome.reached(RunState::Transforming));
        assert!(matches!(outcome.error(), Some(RunError::Cancelled)));
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Succeeded.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Persisting.is_terminal());
        assert_eq!(RunState::Transforming.to_string(), "transforming");
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunTracker::start().run_id(), RunTracker::start().run_id());
    }
}
