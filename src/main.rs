//! Entrypoint: parse CLI args, load config, set up tracing, and run the
//! ingestion service until a shutdown signal arrives.
//!
//! This application uses a strongly-typed configuration (`Settings`)
//! defined in `config.rs`, including a `metrics_bind` key for the
//! `/metrics`/`/healthz` server.
//!
//! **Workflow**:
//! 1. Parse `--config <path>` (default `server.json`).
//! 2. Initialise tracing/logging from `RUST_LOG` (or default to `info`).
//! 3. Load `Settings`, falling back to defaults on any load failure.
//! 4. Build a multi-threaded runtime sized by `http_threads` (the ingress
//!    I/O pool's worker count) and block on the supervisor, which
//!    constructs the task queue, metrics server, writer pool and HTTP
//!    ingress, in that order, running until `SIGINT`/`SIGTERM`.

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use sensor_ingest::cli::Cli;
use sensor_ingest::config::Settings;
use sensor_ingest::errors::IngestError;
use sensor_ingest::supervisor;

fn main() -> Result<(), IngestError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    info!("Starting sensor telemetry ingestor…");

    let settings = Settings::load(&cli.config);
    info!(?settings, "Loaded configuration");

    let worker_threads = settings.http_threads.max(1);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .map_err(IngestError::Io)?;

    runtime.block_on(supervisor::run(settings))
}
