use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use weatherflow_core::Config;
use weatherflow_pipeline::{Driver, Pipeline, RetryPolicy};
use weatherflow_store::SqliteWeatherStore;
use weatherflow_weather::{Location, OpenMeteoClient};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    weatherflow_core::init()?;

    let (config, _) = Config::load_validated()?;
    let driver = build_driver(&config)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, stopping");
                cancel.cancel();
            }
        });
    }

    match config.schedule.interval() {
        Some(interval) => {
            driver.run_every(interval, &cancel).await;
            Ok(())
        }
        None => {
            let report = driver
                .trigger(&cancel)
                .await
                .context("Pipeline already running")?;
            match report.outcome.error() {
                None => Ok(()),
                Some(error) => anyhow::bail!(
                    "{} failed after {} attempt(s): {}",
                    report.pipeline_id,
                    report.attempts,
                    error
                ),
            }
        }
    }
}

fn build_driver(config: &Config) -> Result<Driver<SqliteWeatherStore>> {
    let location = Location::new(config.location.latitude, config.location.longitude);
    let fetcher = OpenMeteoClient::with_base_url(&config.provider.base_url, config.provider.timeout())
        .context("Failed to create weather client")?;
    let store = SqliteWeatherStore::open(&config.database.path)
        .with_context(|| format!("Failed to open {}", config.database.path.display()))?;

    tracing::info!(
        pipeline = %config.schedule.pipeline_id,
        location = config.location.name.as_deref().unwrap_or("unnamed"),
        "Reporting on {} into {}",
        location,
        config.database.path.display()
    );

    let pipeline = Pipeline::new(config.schedule.pipeline_id.clone(), location, fetcher, store);
    Ok(Driver::new(pipeline, RetryPolicy::from(&config.retry)))
}
