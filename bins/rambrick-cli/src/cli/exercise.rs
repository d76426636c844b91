//! Exercise command - seeded mixed workload with shadow verification.
//!
//! Drives reads, writes and discards against one or more devices while
//! mirroring every mutation into a plain in-memory shadow copy. Any
//! divergence between device and shadow fails the run.

use super::{format_size, parse_size, ExerciseArgs};
use anyhow::{bail, ensure, Context, Result};
use rambrick_core::{
    Device, DeviceConfig, DeviceRegistry, IoRequest, PAGE_SECTORS, PAGE_SIZE, SECTOR_SIZE,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Deterministic 64-bit LCG; the high bits are the usable ones.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        self.0 >> 33
    }
}

#[derive(Serialize)]
struct ExerciseReport {
    size_bytes: u64,
    devices: u32,
    ops: u64,
    seed: u64,
    verified: bool,
    elapsed_secs: f64,
    ops_per_sec: f64,
    device_stats: Vec<DeviceReport>,
}

#[derive(Serialize)]
struct DeviceReport {
    device: u32,
    pages_resident: u64,
    mem_used: u64,
    reads: u64,
    writes: u64,
    discards: u64,
    bytes_read: u64,
    bytes_written: u64,
}

pub fn run(args: ExerciseArgs) -> Result<()> {
    let size = parse_size(&args.size)?;
    ensure!(
        size >= PAGE_SIZE as u64,
        "device size must be at least one page"
    );
    ensure!(args.devices > 0, "need at least one device");
    ensure!(
        args.write_percent + args.discard_percent <= 100,
        "write and discard percentages exceed 100"
    );

    tracing::info!(
        size = %format_size(size),
        devices = args.devices,
        ops = args.ops,
        seed = args.seed,
        "starting exercise workload"
    );

    let registry = DeviceRegistry::new(DeviceConfig { size });
    let mut devices = Vec::new();
    for _ in 0..args.devices {
        devices.push(registry.create().context("creating device")?);
    }

    let verify = !args.no_verify;
    let mut shadows: Vec<Vec<u8>> = if verify {
        devices.iter().map(|_| vec![0u8; size as usize]).collect()
    } else {
        Vec::new()
    };

    let mut rng = Lcg(args.seed | 1);
    let start = Instant::now();

    for _ in 0..args.ops {
        let which = (rng.next() % u64::from(args.devices)) as usize;
        let device = &devices[which];
        let roll = rng.next() % 100;

        if roll < args.write_percent {
            do_write(device, &mut rng, verify.then(|| &mut shadows[which]))?;
        } else if roll < args.write_percent + args.discard_percent {
            do_discard(device, &mut rng, verify.then(|| &mut shadows[which]))?;
        } else {
            do_read(device, &mut rng, verify.then(|| &shadows[which]))?;
        }
    }

    if verify {
        for (device, shadow) in devices.iter().zip(&shadows) {
            sweep_verify(device, shadow)?;
        }
    }

    // Finish by purging each device through its open gate: afterwards the
    // stores hold nothing and every sector reads zero again.
    for device in &devices {
        let handle = device.open();
        handle.purge().context("purging device")?;
        ensure!(
            device.stats().pages_resident == 0,
            "{} still holds pages after purge",
            device.name()
        );
    }

    let elapsed = start.elapsed().as_secs_f64();
    let report = ExerciseReport {
        size_bytes: size,
        devices: args.devices,
        ops: args.ops,
        seed: args.seed,
        verified: verify,
        elapsed_secs: elapsed,
        ops_per_sec: args.ops as f64 / elapsed.max(f64::EPSILON),
        device_stats: devices.iter().map(|d| device_report(d)).collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&devices, &report);
    }

    Ok(())
}

fn do_write(device: &Arc<Device>, rng: &mut Lcg, shadow: Option<&mut Vec<u8>>) -> Result<()> {
    let capacity = device.capacity_sectors();
    let len_sectors = 1 + rng.next() % PAGE_SECTORS;
    let sector = rng.next() % (capacity - len_sectors + 1);
    let len = (len_sectors as usize) * SECTOR_SIZE;
    let fill = (rng.next() & 0xFF) as u8;

    let data = vec![fill; len];
    let mut req = IoRequest::write(sector, vec![&data[..]]);
    device
        .submit(&mut req)
        .with_context(|| format!("write at sector {sector}"))?;

    if let Some(shadow) = shadow {
        let offset = (sector as usize) * SECTOR_SIZE;
        shadow[offset..offset + len].fill(fill);
    }
    Ok(())
}

fn do_read(device: &Arc<Device>, rng: &mut Lcg, shadow: Option<&Vec<u8>>) -> Result<()> {
    let capacity = device.capacity_sectors();
    let len_sectors = 1 + rng.next() % PAGE_SECTORS;
    let sector = rng.next() % (capacity - len_sectors + 1);
    let len = (len_sectors as usize) * SECTOR_SIZE;

    let mut buf = vec![0u8; len];
    let mut req = IoRequest::read(sector, vec![&mut buf[..]]);
    device
        .submit(&mut req)
        .with_context(|| format!("read at sector {sector}"))?;

    if let Some(shadow) = shadow {
        let offset = (sector as usize) * SECTOR_SIZE;
        if buf[..] != shadow[offset..offset + len] {
            bail!(
                "{}: readback mismatch at sector {sector} len {len}",
                device.name()
            );
        }
    }
    Ok(())
}

fn do_discard(device: &Arc<Device>, rng: &mut Lcg, shadow: Option<&mut Vec<u8>>) -> Result<()> {
    let capacity_pages = device.capacity_sectors() / PAGE_SECTORS;
    let count = 1 + rng.next() % 4;
    let page = rng.next() % capacity_pages;
    let count = count.min(capacity_pages - page);
    let bytes = (count as usize) * PAGE_SIZE;

    let mut req = IoRequest::discard(page * PAGE_SECTORS, bytes);
    device
        .submit(&mut req)
        .with_context(|| format!("discard at page {page}"))?;

    if let Some(shadow) = shadow {
        let offset = (page as usize) * PAGE_SIZE;
        shadow[offset..offset + bytes].fill(0);
    }
    Ok(())
}

/// Read the whole device page by page and compare against the shadow.
fn sweep_verify(device: &Arc<Device>, shadow: &[u8]) -> Result<()> {
    let capacity_pages = device.capacity_sectors() / PAGE_SECTORS;
    let mut buf = [0u8; PAGE_SIZE];
    for page in 0..capacity_pages {
        device
            .read_page(page * PAGE_SECTORS, &mut buf)
            .with_context(|| format!("sweep read of page {page}"))?;
        let offset = (page as usize) * PAGE_SIZE;
        if buf[..] != shadow[offset..offset + PAGE_SIZE] {
            bail!("{}: sweep mismatch in page {page}", device.name());
        }
    }
    Ok(())
}

fn device_report(device: &Arc<Device>) -> DeviceReport {
    let stats = device.stats();
    DeviceReport {
        device: stats.device,
        pages_resident: stats.pages_resident,
        mem_used: stats.mem_used,
        reads: stats.reads,
        writes: stats.writes,
        discards: stats.discards,
        bytes_read: stats.bytes_read,
        bytes_written: stats.bytes_written,
    }
}

fn print_report(devices: &[Arc<Device>], report: &ExerciseReport) {
    println!("rambrick exercise");
    println!("  Size:      {}", format_size(report.size_bytes));
    println!("  Devices:   {}", report.devices);
    println!("  Ops:       {}", report.ops);
    println!("  Seed:      {}", report.seed);
    println!(
        "  Verified:  {}",
        if report.verified { "yes" } else { "no" }
    );
    println!("  Elapsed:   {:.2}s", report.elapsed_secs);
    println!("  Rate:      {:.0} ops/s", report.ops_per_sec);
    println!();
    for (device, stats) in devices.iter().zip(&report.device_stats) {
        println!("{}", device.name());
        println!("  Reads:     {} ({})", stats.reads, format_size(stats.bytes_read));
        println!(
            "  Writes:    {} ({})",
            stats.writes,
            format_size(stats.bytes_written)
        );
        println!("  Discards:  {}", stats.discards);
        println!(
            "  Resident:  {} pages ({})",
            stats.pages_resident,
            format_size(stats.mem_used)
        );
    }
}
