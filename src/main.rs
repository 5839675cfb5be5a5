use anyhow::{Context, Result};
use batch_fetch::config::Settings;
use batch_fetch::{Args, LogObserver, PoolOptions, WorkerPool, utils};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load().context("Failed to load configuration")?;
    let run = settings.resolve(&args)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(run.log_level).into())
                .from_env_lossy(),
        )
        .init();

    tokio::fs::create_dir_all(&run.output_dir)
        .await
        .with_context(|| format!("Error creating output dir {}", run.output_dir.display()))?;

    let urls = utils::read_url_list(&run.input_file)
        .await
        .with_context(|| format!("Error reading input file {}", run.input_file.display()))?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("batch-fetch/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .build()?;

    let span = tracing::info_span!("batch_fetch", input = %run.input_file.display());
    let observer = Arc::new(LogObserver::new(span));
    let pool = WorkerPool::new(
        client,
        &run.output_dir,
        PoolOptions {
            workers: run.workers,
            ..PoolOptions::default()
        },
        observer,
    );

    info!(
        urls = urls.len(),
        workers = run.workers.get(),
        "Starting downloads into {}",
        run.output_dir.display()
    );
    let report = pool.run(urls).await;

    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        "Downloaded all files listed in: {}",
        run.input_file.display()
    );
    Ok(())
}
