//! Command-line argument parsing: `<binary> [--config <path>]`.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "sensor-ingest", about = "Sensor telemetry ingestion service")]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "server.json")]
    pub config: String,
}
