//! Page buffers and sector/page geometry.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Sector size in bytes, the addressing unit exposed to callers.
pub const SECTOR_SIZE: usize = 512;

/// log2 of [`SECTOR_SIZE`].
pub const SECTOR_SHIFT: u32 = 9;

/// Backing page size in bytes, the unit of allocation.
pub const PAGE_SIZE: usize = 4096;

/// Sectors per page.
pub const PAGE_SECTORS: u64 = (PAGE_SIZE / SECTOR_SIZE) as u64;

/// log2 of [`PAGE_SECTORS`].
pub const PAGE_SECTORS_SHIFT: u32 = 3;

/// Index of the page covering `sector`.
#[inline]
#[must_use]
pub fn page_index(sector: u64) -> u64 {
    sector >> PAGE_SECTORS_SHIFT
}

/// Byte offset of `sector` within its page.
#[inline]
#[must_use]
pub fn page_offset(sector: u64) -> usize {
    ((sector & (PAGE_SECTORS - 1)) << SECTOR_SHIFT) as usize
}

/// One backing page of device content.
///
/// The index is fixed at allocation time and always equals the page's key in
/// the store. Content sits behind its own lock so discard can clear a
/// published page without the index ever moving.
pub struct Page {
    index: u64,
    data: RwLock<Box<[u8]>>,
}

impl Page {
    /// Allocate a zero-filled page tagged with `index`.
    ///
    /// The buffer is reserved fallibly: allocator exhaustion comes back as
    /// [`Error::OutOfMemory`] instead of aborting the process.
    pub(crate) fn alloc_zeroed(index: u64) -> Result<Arc<Self>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(PAGE_SIZE)
            .map_err(|_| Error::OutOfMemory)?;
        buf.resize(PAGE_SIZE, 0u8);
        Ok(Arc::new(Self {
            index,
            data: RwLock::new(buf.into_boxed_slice()),
        }))
    }

    /// Page index: the page's offset within the device in [`PAGE_SIZE`] units.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Copy `dst.len()` bytes out of the page starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + dst.len()` exceeds [`PAGE_SIZE`].
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) {
        let data = self.data.read();
        dst.copy_from_slice(&data[offset..offset + dst.len()]);
    }

    /// Copy `src` into the page starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + src.len()` exceeds [`PAGE_SIZE`].
    pub fn write_at(&self, offset: usize, src: &[u8]) {
        let mut data = self.data.write();
        data[offset..offset + src.len()].copy_from_slice(src);
    }

    /// Clear the page content to zero. The page stays allocated.
    pub fn zero(&self) {
        self.data.write().fill(0);
    }

    /// True when every byte of the page is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.data.read().iter().all(|&b| b == 0)
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
