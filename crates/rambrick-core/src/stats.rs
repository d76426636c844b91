//! Per-device I/O statistics.

use crate::error::Error;
use crate::request::Direction;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Runtime counters, bumped with relaxed atomics on the I/O path.
#[derive(Default)]
pub(crate) struct RuntimeStats {
    reads: AtomicU64,
    writes: AtomicU64,
    discards: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    failed_reads: AtomicU64,
    failed_writes: AtomicU64,
    invalid_requests: AtomicU64,
    purges: AtomicU64,
}

impl RuntimeStats {
    /// Account one completed or failed request.
    pub(crate) fn record(
        &self,
        direction: Direction,
        bytes: u64,
        result: &Result<(), Error>,
    ) {
        match result {
            Ok(()) => match direction {
                Direction::Read | Direction::ReadAhead => {
                    self.reads.fetch_add(1, Ordering::Relaxed);
                    self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
                }
                Direction::Write => {
                    self.writes.fetch_add(1, Ordering::Relaxed);
                    self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
                }
                Direction::Discard => {
                    self.discards.fetch_add(1, Ordering::Relaxed);
                }
            },
            // Boundary-contract violations are counted apart from genuine
            // I/O failures.
            Err(Error::OutOfRange { .. } | Error::InvalidArgument(_)) => {
                self.invalid_requests.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => match direction {
                Direction::Read | Direction::ReadAhead => {
                    self.failed_reads.fetch_add(1, Ordering::Relaxed);
                }
                Direction::Write | Direction::Discard => {
                    self.failed_writes.fetch_add(1, Ordering::Relaxed);
                }
            },
        }
    }

    pub(crate) fn record_purge(&self) {
        self.purges.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        device: u32,
        capacity_bytes: u64,
        pages_resident: u64,
        mem_used: u64,
    ) -> DeviceStats {
        DeviceStats {
            device,
            capacity_bytes,
            pages_resident,
            mem_used,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            discards: self.discards.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            failed_reads: self.failed_reads.load(Ordering::Relaxed),
            failed_writes: self.failed_writes.load(Ordering::Relaxed),
            invalid_requests: self.invalid_requests.load(Ordering::Relaxed),
            purges: self.purges.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time statistics snapshot for one device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Device number.
    pub device: u32,
    /// Configured capacity in bytes.
    pub capacity_bytes: u64,
    /// Pages currently resident in the store.
    pub pages_resident: u64,
    /// Memory held by resident pages, in bytes.
    pub mem_used: u64,
    /// Completed read requests (read-ahead included).
    pub reads: u64,
    /// Completed write requests.
    pub writes: u64,
    /// Completed discard requests.
    pub discards: u64,
    /// Bytes returned by completed reads.
    pub bytes_read: u64,
    /// Bytes accepted by completed writes.
    pub bytes_written: u64,
    /// Read requests that failed after validation.
    pub failed_reads: u64,
    /// Write or discard requests that failed after validation.
    pub failed_writes: u64,
    /// Requests rejected for violating the boundary contract.
    pub invalid_requests: u64,
    /// Purges performed on the device.
    pub purges: u64,
}

impl DeviceStats {
    /// Fraction of notional capacity currently backed by memory.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.capacity_bytes == 0 {
            return 0.0;
        }
        self.mem_used as f64 / self.capacity_bytes as f64
    }
}

impl fmt::Display for DeviceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "brick{}: {}B capacity, {} pages resident ({}B, {:.1}%), {} reads / {} writes / {} discards",
            self.device,
            self.capacity_bytes,
            self.pages_resident,
            self.mem_used,
            self.utilization() * 100.0,
            self.reads,
            self.writes,
            self.discards,
        )
    }
}
