use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use otlp_reshape_collector::{
    ingest_files, new_pipeline, render_snapshot, sweep_expired, CollectorConfig, Error,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Aggregates OTLP metric batches and caches the latest value of every series.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// YAML configuration with `aggregator` and `accumulator` sections.
    #[arg(short, long, env = "OTLP_RESHAPE_CONFIG")]
    config: PathBuf,

    /// Protobuf encoded ExportMetricsServiceRequest files to ingest.
    #[arg(short, long)]
    input: Vec<PathBuf>,

    /// Keep running, evicting expired series at this interval (e.g. `30s`).
    #[arg(long, value_parser = parse_duration)]
    sweep_interval: Option<Duration>,

    /// Log filter (trace, debug, info, warn, error, or a full directive).
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

fn parse_duration(value: &str) -> Result<Duration, humantime_serde::re::humantime::DurationError> {
    humantime_serde::re::humantime::parse_duration(value)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::try_parse()?;
    init_logging(&args.log_level)?;

    let config = CollectorConfig::from_path(&args.config)?;
    tracing::info!(
        rules = config.aggregator.aggregation_rules.len(),
        metric_expiration = ?config.accumulator.metric_expiration,
        "loaded configuration"
    );
    let pipeline = Arc::new(new_pipeline(&config));

    let stored = ingest_files(pipeline.clone(), args.input).await?;
    tracing::info!(stored, series = pipeline.downstream().live_count(), "ingest complete");
    print!("{}", render_snapshot(&pipeline.downstream().collect()));

    if let Some(interval) = args.sweep_interval {
        sweep_expired(pipeline, interval).await?;
    }
    Ok(())
}

/// Installs the tracing subscriber for logging.
fn init_logging(level: &str) -> Result<(), Error> {
    let filter = EnvFilter::try_new(level).or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
    Ok(())
}
