//! CLI module for rambrick
//!
//! Subcommands for exercising in-process devices: a seeded mixed workload
//! with shadow verification, and a fixed end-to-end smoke scenario.

pub mod exercise;
pub mod smoke;

use clap::{Parser, Subcommand};

/// rambrick - volatile RAM-backed block device driver tool
#[derive(Parser)]
#[command(name = "rambrick")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drive a seeded mixed read/write/discard workload
    Exercise(ExerciseArgs),

    /// Run the fixed end-to-end smoke scenario
    Smoke(SmokeArgs),
}

/// Exercise command arguments
#[derive(Parser)]
pub struct ExerciseArgs {
    /// Device size (e.g., 64M, 1G)
    #[arg(short, long, default_value = "64M")]
    pub size: String,

    /// Number of devices to drive
    #[arg(short, long, default_value = "1")]
    pub devices: u32,

    /// Number of operations to run
    #[arg(short = 'n', long, default_value = "100000")]
    pub ops: u64,

    /// Workload seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Percentage of operations that are writes
    #[arg(long, default_value = "60")]
    pub write_percent: u64,

    /// Percentage of operations that are discards
    #[arg(long, default_value = "10")]
    pub discard_percent: u64,

    /// Skip shadow-model verification (throughput runs)
    #[arg(long)]
    pub no_verify: bool,

    /// JSON report
    #[arg(long)]
    pub json: bool,
}

/// Smoke command arguments
#[derive(Parser)]
pub struct SmokeArgs {
    /// JSON report
    #[arg(long)]
    pub json: bool,
}

/// Parse a human-readable size string (e.g., "64M", "1G") into bytes
pub fn parse_size(s: &str) -> anyhow::Result<u64> {
    let s = s.trim().to_uppercase();
    let (num, multiplier) = if s.ends_with('T') || s.ends_with("TIB") {
        (s.trim_end_matches("TIB").trim_end_matches('T'), 1u64 << 40)
    } else if s.ends_with('G') || s.ends_with("GIB") {
        (s.trim_end_matches("GIB").trim_end_matches('G'), 1u64 << 30)
    } else if s.ends_with('M') || s.ends_with("MIB") {
        (s.trim_end_matches("MIB").trim_end_matches('M'), 1u64 << 20)
    } else if s.ends_with('K') || s.ends_with("KIB") {
        (s.trim_end_matches("KIB").trim_end_matches('K'), 1u64 << 10)
    } else {
        (s.as_str(), 1u64)
    };

    let num: u64 = num.trim().parse()?;
    Ok(num * multiplier)
}

/// Format bytes as a human-readable string
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;
    const TIB: u64 = GIB * 1024;

    if bytes >= TIB {
        format!("{:.1}T", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1}G", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1}M", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1}K", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes}B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_plain_bytes() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
    }

    #[test]
    fn test_parse_size_kilobytes() {
        assert_eq!(parse_size("8K").unwrap(), 8 << 10);
        assert_eq!(parse_size("8KiB").unwrap(), 8 << 10);
    }

    #[test]
    fn test_parse_size_megabytes() {
        assert_eq!(parse_size("64M").unwrap(), 64 << 20);
    }

    #[test]
    fn test_parse_size_gigabytes() {
        assert_eq!(parse_size("2G").unwrap(), 2u64 << 30);
        assert_eq!(parse_size("2gib").unwrap(), 2u64 << 30);
    }

    #[test]
    fn test_parse_size_terabytes() {
        assert_eq!(parse_size("1T").unwrap(), 1u64 << 40);
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(parse_size("lots").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(8 << 10), "8.0K");
        assert_eq!(format_size(64 << 20), "64.0M");
        assert_eq!(format_size(2u64 << 30), "2.0G");
    }
}
