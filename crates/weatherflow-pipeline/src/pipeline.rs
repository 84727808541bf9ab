//! The pipeline definition and its single-run sequence.

use tokio_util::sync::CancellationToken;
use tracing::instrument;
use weatherflow_store::WeatherSink;
use weatherflow_weather::{transform, Location, OpenMeteoClient};

use crate::error::RunError;
use crate::run::{CompletedRun, RunOutcome, RunState, RunTracker};

/// One fetch → transform → persist chain for a fixed location.
///
/// Stages hand their output straight to the next one; nothing is shared
/// between runs except the rows already in the sink.
pub struct Pipeline<S> {
    id: String,
    location: Location,
    fetcher: OpenMeteoClient,
    sink: S,
}

impl<S: WeatherSink> Pipeline<S> {
    pub fn new(id: impl Into<String>, location: Location, fetcher: OpenMeteoClient, sink: S) -> Self {
        Self {
            id: id.into(),
            location,
            fetcher,
            sink,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Execute one run.
    ///
    /// Stages run strictly in order and the first failure ends the run.
    /// Cancellation is honoured while fetching and before persisting, so a
    /// cancelled run never writes a row.
    #[instrument(skip(self, cancel), fields(pipeline = %self.id, run_id = tracing::field::Empty), level = "info")]
    pub async fn run(&self, cancel: &CancellationToken) -> RunOutcome {
        let mut run = RunTracker::start();
        tracing::Span::current().record("run_id", tracing::field::display(run.run_id()));

        run.advance(RunState::Fetching);
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return run.fail(RunError::Cancelled),
            fetched = self.fetcher.fetch(&self.location) => fetched,
        };
        let payload = match fetched {
            Ok(payload) => payload,
            Err(e) => return run.fail(e.into()),
        };

        run.advance(RunState::Transforming);
        let record = match transform(&payload, &self.location) {
            Ok(record) => record,
            Err(e) => return run.fail(e.into()),
        };
        drop(payload);

        if cancel.is_cancelled() {
            return run.fail(RunError::Cancelled);
        }

        run.advance(RunState::Persisting);
        let row_id = match self.sink.persist(&record) {
            Ok(id) => id,
            Err(e) => return run.fail(e.into()),
        };

        tracing::info!(
            row_id,
            "Stored {:.1}°C, wind {:.1} km/h from {:.0}°, {}",
            record.temperature,
            record.windspeed,
            record.winddirection,
            record.condition()
        );
        run.succeed(CompletedRun { record, row_id })
    }
}
