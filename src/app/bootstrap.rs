use std::fs::OpenOptions;

use env_logger::{Env, Target};
use log::{info, warn};

use crate::app::controller::{ChartSettings, DashboardController};
use crate::config::{validate_config, Config, LoggingConfig};
use crate::error::{Context, Result};
use crate::fetch::{HistoryFetcher, HttpKlineSource};
use crate::stream::PriceSubscriber;
use crate::ui::run_dashboard;

/// Entry point used by `main`: wire the ticker stream and chart controller into the dashboard.
pub async fn run() -> Result<()> {
    let config = Config::from_env();
    validate_config(&config)?;
    init_logging(&config.logging)?;

    info!(
        "Starting dashboard for {} (history from {})",
        config.stream.pairs().join(", "),
        config.history.endpoint
    );

    let subscriber = PriceSubscriber::activate(&config.stream)?;
    let source = HttpKlineSource::new(&config.history)?;
    let fetcher = HistoryFetcher::with_max_batch(source, config.history.max_batch);
    let mut controller = DashboardController::new(fetcher, ChartSettings::from_config(&config));

    let outcome = run_dashboard(&config, &subscriber, &mut controller).await;
    if let Err(err) = &outcome {
        warn!("Dashboard exited with error: {}", err);
    }

    controller.shutdown();
    subscriber.deactivate().await;
    info!("Dashboard stopped");
    outcome
}

/// Route the `log` facade to a file; the terminal belongs to the dashboard.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .with_context(|| format!("Failed to open log file {}", config.file.display()))?;

    env_logger::Builder::from_env(Env::default().default_filter_or(config.default_filter.as_str()))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("Failed to install logger")?;
    Ok(())
}
