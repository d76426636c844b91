//! rambrick - volatile RAM-backed block device driver tool
//!
//! Creates in-process rambrick devices and drives I/O against them.
//!
//! # Usage
//!
//! ```bash
//! # Run the end-to-end smoke scenario on a small device
//! rambrick smoke
//!
//! # Drive a seeded mixed workload across two 64 MiB devices
//! rambrick exercise -s 64M -d 2 -n 100000
//!
//! # Same, with a JSON report
//! rambrick exercise -s 64M --json
//! ```

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Exercise(args) => cli::exercise::run(args),
        Commands::Smoke(args) => cli::smoke::run(args),
    }
}
