//! Device: one logical disk backed by a sparse page store.

use crate::error::{Error, Result};
use crate::io;
use crate::page::{PAGE_SECTORS, PAGE_SIZE, SECTOR_SHIFT, SECTOR_SIZE};
use crate::request::{self, Direction, IoRequest};
use crate::stats::{DeviceStats, RuntimeStats};
use crate::store::PageStore;
use parking_lot::Mutex;
use std::fmt;

/// Cooperative open/close gate.
///
/// The engine does not refcount its callers. Whoever manages device nodes
/// opens and closes through this gate, and purge decides "am I the last
/// opener" under the same lock.
#[derive(Default)]
struct OpenGate {
    openers: Mutex<u32>,
}

/// A logical block device with lazily allocated backing pages.
///
/// Capacity is notional: a freshly created device of any size holds no
/// memory, and pages appear only as writes (or allocating discard paths)
/// touch them.
pub struct Device {
    id: u32,
    capacity_sectors: u64,
    store: PageStore,
    stats: RuntimeStats,
    gate: OpenGate,
}

impl Device {
    /// Create a device with the given capacity in bytes.
    ///
    /// Nothing is pre-allocated.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when the capacity is zero or not a whole
    /// number of sectors.
    pub fn new(id: u32, capacity_bytes: u64) -> Result<Self> {
        if capacity_bytes == 0 || capacity_bytes % SECTOR_SIZE as u64 != 0 {
            return Err(Error::InvalidArgument(format!(
                "capacity {capacity_bytes} is not a whole number of sectors"
            )));
        }
        let capacity_sectors = capacity_bytes >> SECTOR_SHIFT;
        tracing::debug!(device = id, capacity_sectors, "device created");
        Ok(Self {
            id,
            capacity_sectors,
            store: PageStore::new(),
            stats: RuntimeStats::default(),
            gate: OpenGate::default(),
        })
    }

    /// Device number.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Device name, `brick<id>`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("brick{}", self.id)
    }

    /// Capacity in sectors.
    #[must_use]
    pub fn capacity_sectors(&self) -> u64 {
        self.capacity_sectors
    }

    /// Capacity in bytes.
    #[must_use]
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_sectors << SECTOR_SHIFT
    }

    /// Submit one I/O request and wait for its synchronous completion.
    ///
    /// The request transitions `Pending -> InProgress -> Completed`; the
    /// returned value matches the outcome stored in the request state.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] past capacity, [`Error::InvalidArgument`] for
    /// contract-violating segments, [`Error::OutOfMemory`] when a write
    /// cannot allocate backing pages. A mid-request failure leaves earlier
    /// segments applied.
    pub fn submit(&self, req: &mut IoRequest<'_>) -> Result<()> {
        let direction = req.direction();
        let bytes = req.total_bytes() as u64;
        let result = request::dispatch(&self.store, self.capacity_sectors, req);
        self.stats.record(direction, bytes, &result);
        if let Err(ref err) = result {
            tracing::debug!(device = self.id, ?direction, %err, "request failed");
        }
        result
    }

    /// Read one whole page at a page-aligned sector.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when `sector` is not page aligned,
    /// [`Error::OutOfRange`] past capacity.
    pub fn read_page(&self, sector: u64, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let result = self.check_page_span(sector).map(|()| {
            io::copy_from_store(&self.store, buf, sector);
        });
        self.stats.record(Direction::Read, PAGE_SIZE as u64, &result);
        result
    }

    /// Write one whole page at a page-aligned sector.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when `sector` is not page aligned,
    /// [`Error::OutOfRange`] past capacity, [`Error::OutOfMemory`] when the
    /// backing page cannot be allocated.
    pub fn write_page(&self, sector: u64, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        let result = self.check_page_span(sector).and_then(|()| {
            io::write_setup(&self.store, sector, PAGE_SIZE)?;
            io::copy_to_store(&self.store, buf, sector);
            Ok(())
        });
        self.stats.record(Direction::Write, PAGE_SIZE as u64, &result);
        result
    }

    fn check_page_span(&self, sector: u64) -> Result<()> {
        if sector & (PAGE_SECTORS - 1) != 0 {
            return Err(Error::InvalidArgument(format!(
                "sector {sector} is not page aligned"
            )));
        }
        let end_sector = sector + PAGE_SECTORS;
        if end_sector > self.capacity_sectors {
            return Err(Error::OutOfRange {
                end_sector,
                capacity_sectors: self.capacity_sectors,
            });
        }
        Ok(())
    }

    /// Open the device, returning a handle that closes it on drop.
    ///
    /// The handle is the ticket for [`OpenHandle::purge`]: only an opener
    /// that observes itself as the last one may destroy the contents.
    pub fn open(&self) -> OpenHandle<'_> {
        *self.gate.openers.lock() += 1;
        OpenHandle { device: self }
    }

    /// Number of current openers.
    #[must_use]
    pub fn openers(&self) -> u32 {
        *self.gate.openers.lock()
    }

    /// Point-in-time statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> DeviceStats {
        let pages = self.store.page_count() as u64;
        self.stats.snapshot(
            self.id,
            self.capacity_bytes(),
            pages,
            pages * PAGE_SIZE as u64,
        )
    }

    /// Free every backing page unconditionally.
    ///
    /// Teardown path: by contract no openers exist and no I/O is in flight
    /// when the surrounding lifecycle calls this.
    pub(crate) fn free_pages(&self) {
        self.store.free_all();
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("capacity_sectors", &self.capacity_sectors)
            .finish_non_exhaustive()
    }
}

/// An open reference to a [`Device`]; closes on drop.
pub struct OpenHandle<'a> {
    device: &'a Device,
}

impl OpenHandle<'_> {
    /// The device this handle holds open.
    #[must_use]
    pub fn device(&self) -> &Device {
        self.device
    }

    /// Destroy the device contents, freeing every backing page.
    ///
    /// Succeeds only for the sole opener, checked under the open gate; the
    /// gate stays held until the store is empty, so a racing open observes
    /// either the old contents or an empty device, never a partial purge.
    /// Callers must have quiesced their own I/O first.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] when another opener holds the device.
    pub fn purge(&self) -> Result<()> {
        let openers = self.device.gate.openers.lock();
        if *openers > 1 {
            tracing::debug!(device = self.device.id, openers = *openers, "purge refused");
            return Err(Error::Busy);
        }
        self.device.store.free_all();
        self.device.stats.record_purge();
        drop(openers);
        tracing::info!(device = self.device.id, "device contents purged");
        Ok(())
    }
}

impl Drop for OpenHandle<'_> {
    fn drop(&mut self) {
        *self.device.gate.openers.lock() -= 1;
    }
}
