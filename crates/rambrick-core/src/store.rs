//! Sparse page store: the contents of one device.
//!
//! Pages are keyed by page index in a sharded hash index. Only indices that
//! have been written (or touched by an allocating path) are present; absent
//! indices read as zero at the layers above.

use crate::error::Result;
use crate::page::Page;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

/// Number of index shards. Power of two so shard selection is a mask.
const SHARD_COUNT: usize = 16;

/// Pages removed per critical section during [`PageStore::free_all`].
const FREE_BATCH: usize = 16;

type Shard = RwLock<FxHashMap<u64, Arc<Page>>>;

/// Sparse mapping from page index to backing page.
///
/// Lookups against different indices never contend; same-index operations
/// serialize only on the owning shard's lock, and a page is published into
/// its shard only after it is fully zeroed and tagged.
pub struct PageStore {
    shards: Box<[Shard]>,
}

impl PageStore {
    /// Create an empty store. No pages are pre-allocated.
    #[must_use]
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| RwLock::new(FxHashMap::default()))
            .collect();
        Self { shards }
    }

    #[inline]
    fn shard(&self, index: u64) -> &Shard {
        &self.shards[(index as usize) & (SHARD_COUNT - 1)]
    }

    /// Look up the page with the given index.
    ///
    /// Read-side only; concurrent lookups do not block each other. A racing
    /// insert is observed either as absence or as the fully initialized page.
    ///
    /// # Panics
    ///
    /// Panics if a stored page's index disagrees with its key. That is index
    /// corruption, a contract violation there is no recovering from.
    #[must_use]
    pub fn lookup(&self, index: u64) -> Option<Arc<Page>> {
        let page = self.shard(index).read().get(&index).cloned();
        if let Some(ref page) = page {
            assert_eq!(page.index(), index, "page store index corruption");
        }
        page
    }

    /// Look up the page with the given index, allocating a zero-filled page
    /// if none exists.
    ///
    /// The candidate page is allocated outside the shard lock; the insert
    /// under the lock decides the winner when two callers race on the same
    /// absent index. The loser's buffer is dropped and the winner's page
    /// returned, so exactly one page ever exists per index.
    ///
    /// # Errors
    ///
    /// [`crate::Error::OutOfMemory`] when the page buffer cannot be
    /// allocated. The index is left untouched in that case.
    pub fn lookup_or_insert(&self, index: u64) -> Result<Arc<Page>> {
        if let Some(page) = self.lookup(index) {
            return Ok(page);
        }

        let fresh = Page::alloc_zeroed(index)?;
        let mut shard = self.shard(index).write();
        match shard.entry(index) {
            Entry::Occupied(entry) => {
                let page = Arc::clone(entry.get());
                assert_eq!(page.index(), index, "page store index corruption");
                Ok(page)
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&fresh));
                Ok(fresh)
            }
        }
    }

    /// Remove and free the page with the given index. No-op when absent.
    pub fn remove(&self, index: u64) -> bool {
        self.shard(index).write().remove(&index).is_some()
    }

    /// Remove and free every page currently present.
    ///
    /// Callers must hold the device exclusively (purge gate or teardown); no
    /// lookup or insert may run concurrently. Pages drain in bounded batches
    /// so a shard holding millions of pages never pins one critical section.
    pub fn free_all(&self) {
        for shard in self.shards.iter() {
            loop {
                let mut guard = shard.write();
                if guard.is_empty() {
                    break;
                }
                let batch: Vec<u64> = guard.keys().take(FREE_BATCH).copied().collect();
                for index in batch {
                    guard.remove(&index);
                }
            }
        }
    }

    /// Number of resident pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// True when no pages are resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }
}

impl Default for PageStore {
    fn default() -> Self {
        Self::new()
    }
}
