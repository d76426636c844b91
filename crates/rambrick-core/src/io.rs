//! Sub-page copy and discard paths.
//!
//! The request layer bounds every copy to at most one page's worth of bytes,
//! so a span covers at most two pages: the tail of the page holding the
//! starting sector, then the head of the page after it.

use crate::error::Result;
use crate::page::{page_index, page_offset, PAGE_SECTORS, PAGE_SIZE, SECTOR_SHIFT};
use crate::store::PageStore;

/// Ensure every page covered by an upcoming write exists.
///
/// Runs before the copy so the copy itself never allocates. A failure here
/// propagates up and fails the request; segments already applied stay
/// applied, nothing is rolled back.
pub(crate) fn write_setup(store: &PageStore, sector: u64, n: usize) -> Result<()> {
    let offset = page_offset(sector);
    let copy = n.min(PAGE_SIZE - offset);

    store.lookup_or_insert(page_index(sector))?;
    if copy < n {
        let sector = sector + (copy >> SECTOR_SHIFT) as u64;
        store.lookup_or_insert(page_index(sector))?;
    }
    Ok(())
}

/// Copy `src` into the store starting at `sector`.
///
/// Covered pages must already exist; [`write_setup`] runs first on every
/// write path.
pub(crate) fn copy_to_store(store: &PageStore, src: &[u8], sector: u64) {
    let offset = page_offset(sector);
    let copy = src.len().min(PAGE_SIZE - offset);

    let page = store
        .lookup(page_index(sector))
        .expect("write target page missing after setup");
    page.write_at(offset, &src[..copy]);

    if copy < src.len() {
        let sector = sector + (copy >> SECTOR_SHIFT) as u64;
        let page = store
            .lookup(page_index(sector))
            .expect("write target page missing after setup");
        page.write_at(0, &src[copy..]);
    }
}

/// Copy from the store starting at `sector` into `dst`.
///
/// Spans with no backing page are zero-filled: an unwritten sector reads as
/// zero, forever, until written.
pub(crate) fn copy_from_store(store: &PageStore, dst: &mut [u8], sector: u64) {
    let offset = page_offset(sector);
    let copy = dst.len().min(PAGE_SIZE - offset);

    match store.lookup(page_index(sector)) {
        Some(page) => page.read_at(offset, &mut dst[..copy]),
        None => dst[..copy].fill(0),
    }

    if copy < dst.len() {
        let sector = sector + (copy >> SECTOR_SHIFT) as u64;
        match store.lookup(page_index(sector)) {
            Some(page) => page.read_at(0, &mut dst[copy..]),
            None => dst[copy..].fill(0),
        }
    }
}

/// Zero every whole page covered by the span.
///
/// A trailing remainder smaller than a page is left untouched. Pages are
/// cleared, not freed: freeing would force reallocation on the next write,
/// and discard can run from contexts that must not block on the allocator.
pub(crate) fn discard_range(store: &PageStore, mut sector: u64, mut n: usize) {
    while n >= PAGE_SIZE {
        if let Some(page) = store.lookup(page_index(sector)) {
            page.zero();
        }
        sector += PAGE_SECTORS;
        n -= PAGE_SIZE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_setup_single_page() {
        let store = PageStore::new();
        write_setup(&store, 2, 1024).unwrap();
        assert_eq!(store.page_count(), 1);
        assert!(store.lookup(0).is_some());
    }

    #[test]
    fn test_write_setup_crossing_boundary() {
        let store = PageStore::new();
        // Sector 7 is the last sector of page 0; 1024 bytes spill into page 1.
        write_setup(&store, 7, 1024).unwrap();
        assert_eq!(store.page_count(), 2);
        assert!(store.lookup(0).is_some());
        assert!(store.lookup(1).is_some());
    }

    #[test]
    fn test_copy_roundtrip_within_page() {
        let store = PageStore::new();
        let src: Vec<u8> = (0..1024).map(|i| (i % 251) as u8).collect();

        write_setup(&store, 2, src.len()).unwrap();
        copy_to_store(&store, &src, 2);

        let mut dst = vec![0u8; src.len()];
        copy_from_store(&store, &mut dst, 2);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_copy_splits_across_boundary() {
        let store = PageStore::new();
        let src = vec![0xCD_u8; 1024];

        write_setup(&store, 7, src.len()).unwrap();
        copy_to_store(&store, &src, 7);

        // First 512 bytes land at the tail of page 0, the rest at the head
        // of page 1.
        let page0 = store.lookup(0).unwrap();
        let page1 = store.lookup(1).unwrap();

        let mut tail = [0u8; 512];
        page0.read_at(PAGE_SIZE - 512, &mut tail);
        assert!(tail.iter().all(|&b| b == 0xCD));

        let mut head = [0u8; 512];
        page1.read_at(0, &mut head);
        assert!(head.iter().all(|&b| b == 0xCD));

        // Byte before the span is untouched.
        let mut before = [0xFFu8; 1];
        page0.read_at(PAGE_SIZE - 513, &mut before);
        assert_eq!(before[0], 0);
    }

    #[test]
    fn test_read_absent_zero_fills() {
        let store = PageStore::new();
        let mut dst = vec![0xFFu8; 2048];
        copy_from_store(&store, &mut dst, 4);
        assert!(dst.iter().all(|&b| b == 0));
        // Reads never allocate.
        assert!(store.is_empty());
    }

    #[test]
    fn test_read_straddles_present_and_absent() {
        let store = PageStore::new();
        let src = vec![0xAB_u8; 512];
        write_setup(&store, 7, src.len()).unwrap();
        copy_to_store(&store, &src, 7);

        // Page 0 exists (sector 7), page 1 does not; read sectors 7..9.
        let mut dst = vec![0xFFu8; 1024];
        copy_from_store(&store, &mut dst, 7);
        assert!(dst[..512].iter().all(|&b| b == 0xAB));
        assert!(dst[512..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_discard_zeroes_whole_pages_only() {
        let store = PageStore::new();
        for index in 0..3u64 {
            let page = store.lookup_or_insert(index).unwrap();
            page.write_at(0, &[0xEE; PAGE_SIZE]);
        }

        // Two whole pages plus half a page; the tail half-page survives.
        discard_range(&store, 0, 2 * PAGE_SIZE + PAGE_SIZE / 2);

        assert!(store.lookup(0).unwrap().is_zero());
        assert!(store.lookup(1).unwrap().is_zero());
        assert!(!store.lookup(2).unwrap().is_zero());
        // Nothing was freed.
        assert_eq!(store.page_count(), 3);
    }

    #[test]
    fn test_discard_below_page_size_is_noop() {
        let store = PageStore::new();
        let page = store.lookup_or_insert(0).unwrap();
        page.write_at(0, &[0x11; PAGE_SIZE]);

        discard_range(&store, 0, PAGE_SIZE - 1);
        assert!(!page.is_zero());
    }

    #[test]
    fn test_discard_absent_pages_is_noop() {
        let store = PageStore::new();
        discard_range(&store, 0, 4 * PAGE_SIZE);
        assert!(store.is_empty());
    }
}
