//! Volatile RAM-backed block storage engine.
//!
//! A rambrick device is a logical disk whose contents live entirely in
//! lazily allocated 4 KiB pages, addressed by 512-byte sector. A sector that
//! was never written costs no memory and reads back as zero; discard resets
//! whole pages without giving their memory back. Everything is volatile by
//! design: device teardown or a purge by the last opener destroys the
//! contents.
//!
//! # Example
//!
//! ```
//! use rambrick_core::{Device, IoRequest, PAGE_SIZE};
//!
//! let device = Device::new(0, (4 * PAGE_SIZE) as u64)?;
//!
//! let payload = vec![0xAB_u8; PAGE_SIZE];
//! let mut write = IoRequest::write(0, vec![&payload[..]]);
//! device.submit(&mut write)?;
//!
//! let mut buf = vec![0u8; PAGE_SIZE];
//! let mut read = IoRequest::read(0, vec![&mut buf[..]]);
//! device.submit(&mut read)?;
//! assert_eq!(buf, payload);
//!
//! // Sectors never written read as zero.
//! let mut never = vec![0xFF_u8; PAGE_SIZE];
//! let mut read = IoRequest::read(8, vec![&mut never[..]]);
//! device.submit(&mut read)?;
//! assert!(never.iter().all(|&b| b == 0));
//! # Ok::<(), rambrick_core::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod device;
mod error;
mod io;
mod page;
mod registry;
mod request;
mod stats;
mod store;

pub use device::{Device, OpenHandle};
pub use error::{Error, Result};
pub use page::{
    page_index, page_offset, Page, PAGE_SECTORS, PAGE_SECTORS_SHIFT, PAGE_SIZE, SECTOR_SHIFT,
    SECTOR_SIZE,
};
pub use registry::{DeviceConfig, DeviceRegistry};
pub use request::{Direction, IoRequest, RequestState};
pub use stats::DeviceStats;
pub use store::PageStore;
