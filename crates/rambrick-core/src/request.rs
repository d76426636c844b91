//! Block I/O request model and dispatch.
//!
//! A request carries a starting sector and buffers already subdivided into
//! at most page-sized, sector-aligned segments, the shape a block layer
//! hands down. Dispatch walks the segments in ascending sector order and
//! stops at the first failure; segments already applied stay applied.

use crate::error::{Error, Result};
use crate::io;
use crate::page::{PAGE_SIZE, SECTOR_SHIFT, SECTOR_SIZE};
use crate::store::PageStore;

/// Direction of an I/O request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Copy device content out to the caller's buffers.
    Read,
    /// Speculative read issued ahead of demand; serviced exactly like
    /// [`Direction::Read`].
    ReadAhead,
    /// Copy the caller's buffers into the device.
    Write,
    /// Hint that a byte range's content may be reset.
    Discard,
}

/// Lifecycle of a submitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    /// Built but not yet submitted.
    Pending,
    /// Dispatch has started.
    InProgress,
    /// Dispatch finished with the stored outcome.
    Completed(Result<()>),
}

enum IoOp<'a> {
    Read {
        segments: Vec<&'a mut [u8]>,
        read_ahead: bool,
    },
    Write {
        segments: Vec<&'a [u8]>,
    },
    Discard {
        bytes: usize,
    },
}

/// One block I/O request.
///
/// Constructed through [`IoRequest::read`], [`IoRequest::read_ahead`],
/// [`IoRequest::write`] or [`IoRequest::discard`] and handed to
/// [`crate::Device::submit`].
pub struct IoRequest<'a> {
    sector: u64,
    op: IoOp<'a>,
    state: RequestState,
}

impl<'a> IoRequest<'a> {
    /// Read into `segments`, starting at `sector`.
    #[must_use]
    pub fn read(sector: u64, segments: Vec<&'a mut [u8]>) -> Self {
        Self {
            sector,
            op: IoOp::Read {
                segments,
                read_ahead: false,
            },
            state: RequestState::Pending,
        }
    }

    /// Read-ahead into `segments`, starting at `sector`. Serviced the same
    /// as a plain read; the flag is kept for accounting only.
    #[must_use]
    pub fn read_ahead(sector: u64, segments: Vec<&'a mut [u8]>) -> Self {
        Self {
            sector,
            op: IoOp::Read {
                segments,
                read_ahead: true,
            },
            state: RequestState::Pending,
        }
    }

    /// Write `segments` to the device, starting at `sector`.
    #[must_use]
    pub fn write(sector: u64, segments: Vec<&'a [u8]>) -> Self {
        Self {
            sector,
            op: IoOp::Write { segments },
            state: RequestState::Pending,
        }
    }

    /// Discard `bytes` bytes starting at `sector`.
    #[must_use]
    pub fn discard(sector: u64, bytes: usize) -> Self {
        Self {
            sector,
            op: IoOp::Discard { bytes },
            state: RequestState::Pending,
        }
    }

    /// Starting sector.
    #[must_use]
    pub fn sector(&self) -> u64 {
        self.sector
    }

    /// Request direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        match &self.op {
            IoOp::Read {
                read_ahead: false, ..
            } => Direction::Read,
            IoOp::Read {
                read_ahead: true, ..
            } => Direction::ReadAhead,
            IoOp::Write { .. } => Direction::Write,
            IoOp::Discard { .. } => Direction::Discard,
        }
    }

    /// Total bytes the request covers.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        match &self.op {
            IoOp::Read { segments, .. } => segments.iter().map(|s| s.len()).sum(),
            IoOp::Write { segments } => segments.iter().map(|s| s.len()).sum(),
            IoOp::Discard { bytes } => *bytes,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> &RequestState {
        &self.state
    }
}

/// Dispatch one request against a store of `capacity_sectors` sectors.
///
/// Drives the request through `Pending -> InProgress -> Completed` and
/// returns the completion outcome.
pub(crate) fn dispatch(
    store: &PageStore,
    capacity_sectors: u64,
    req: &mut IoRequest<'_>,
) -> Result<()> {
    req.state = RequestState::InProgress;
    let result = run(store, capacity_sectors, req);
    req.state = RequestState::Completed(result.clone());
    result
}

fn run(store: &PageStore, capacity_sectors: u64, req: &mut IoRequest<'_>) -> Result<()> {
    validate(req, capacity_sectors)?;

    let mut sector = req.sector;
    match &mut req.op {
        IoOp::Discard { bytes } => {
            io::discard_range(store, sector, *bytes);
            Ok(())
        }
        IoOp::Read { segments, .. } => {
            for segment in segments.iter_mut() {
                io::copy_from_store(store, segment, sector);
                sector += (segment.len() >> SECTOR_SHIFT) as u64;
            }
            Ok(())
        }
        IoOp::Write { segments } => {
            for segment in segments.iter() {
                // Allocation happens up front so the copy never fails; the
                // first segment that cannot allocate aborts the request and
                // leaves earlier segments applied.
                io::write_setup(store, sector, segment.len())?;
                io::copy_to_store(store, segment, sector);
                sector += (segment.len() >> SECTOR_SHIFT) as u64;
            }
            Ok(())
        }
    }
}

/// Reject contract violations before anything is mutated.
fn validate(req: &IoRequest<'_>, capacity_sectors: u64) -> Result<()> {
    match &req.op {
        IoOp::Read { segments, .. } => {
            validate_segments(segments.iter().map(|s| s.len()))?;
        }
        IoOp::Write { segments } => {
            validate_segments(segments.iter().map(|s| s.len()))?;
        }
        IoOp::Discard { bytes } => {
            if *bytes % SECTOR_SIZE != 0 {
                return Err(Error::InvalidArgument(format!(
                    "discard length {bytes} not sector aligned"
                )));
            }
        }
    }

    let end_sector = req.sector + (req.total_bytes() >> SECTOR_SHIFT) as u64;
    if end_sector > capacity_sectors {
        return Err(Error::OutOfRange {
            end_sector,
            capacity_sectors,
        });
    }
    Ok(())
}

fn validate_segments(lengths: impl Iterator<Item = usize>) -> Result<()> {
    for len in lengths {
        if len == 0 || len % SECTOR_SIZE != 0 {
            return Err(Error::InvalidArgument(format!(
                "segment length {len} not sector aligned"
            )));
        }
        if len > PAGE_SIZE {
            return Err(Error::InvalidArgument(format!(
                "segment length {len} exceeds page size"
            )));
        }
    }
    Ok(())
}
