//! Process-wide device registry.
//!
//! An explicit object rather than module-global state, so independent
//! registries can coexist (one per test, one per daemon). Creation and
//! teardown serialize on one coarse lock; the data path never touches it.

use crate::device::Device;
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Configuration applied to devices the registry creates.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device size in bytes; must be a whole number of sectors.
    pub size: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        // 4 MiB, the traditional RAM-disk default.
        Self { size: 4 << 20 }
    }
}

/// Registry of live devices, keyed by device number.
pub struct DeviceRegistry {
    devices: Mutex<HashMap<u32, Arc<Device>>>,
    config: DeviceConfig,
}

impl DeviceRegistry {
    /// Create an empty registry; `config` applies to every device it makes.
    #[must_use]
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Create a device under the lowest free device number.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when the configured size is not a whole
    /// number of sectors.
    pub fn create(&self) -> Result<Arc<Device>> {
        let mut devices = self.devices.lock();
        let mut id = 0u32;
        while devices.contains_key(&id) {
            id += 1;
        }
        let device = Arc::new(Device::new(id, self.config.size)?);
        devices.insert(id, Arc::clone(&device));
        tracing::info!(device = id, size = self.config.size, "device registered");
        Ok(device)
    }

    /// Look up a device by number.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<Arc<Device>> {
        self.devices.lock().get(&id).cloned()
    }

    /// Look up a device by number, instantiating it on demand.
    ///
    /// Access to a device number that has not been created yet brings the
    /// device into existence, the way probing a device node does.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when a new device must be created and the
    /// configured size is not a whole number of sectors.
    pub fn get_or_create(&self, id: u32) -> Result<Arc<Device>> {
        let mut devices = self.devices.lock();
        if let Some(device) = devices.get(&id) {
            return Ok(Arc::clone(device));
        }
        let device = Arc::new(Device::new(id, self.config.size)?);
        devices.insert(id, Arc::clone(&device));
        tracing::info!(device = id, size = self.config.size, "device instantiated on demand");
        Ok(device)
    }

    /// Tear down a device: deregister it and free all its pages.
    ///
    /// Returns `false` when no device with that number exists. Callers
    /// guarantee no openers remain.
    pub fn remove(&self, id: u32) -> bool {
        let removed = self.devices.lock().remove(&id);
        match removed {
            Some(device) => {
                device.free_pages();
                tracing::info!(device = id, "device removed");
                true
            }
            None => false,
        }
    }

    /// Snapshot of all live devices, ordered by device number.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<Device>> {
        let devices = self.devices.lock();
        let mut all: Vec<Arc<Device>> = devices.values().cloned().collect();
        all.sort_by_key(|device| device.id());
        all
    }

    /// Number of live devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    /// True when no devices are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.lock().is_empty()
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        // Shutdown path: every remaining device gives back its pages.
        for device in self.devices.get_mut().values() {
            device.free_pages();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::page::PAGE_SIZE;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(DeviceConfig {
            size: 4 * PAGE_SIZE as u64,
        })
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let registry = registry();
        let a = registry.create().unwrap();
        let b = registry.create().unwrap();
        assert_eq!(a.id(), 0);
        assert_eq!(b.id(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_create_reuses_freed_ids() {
        let registry = registry();
        registry.create().unwrap();
        registry.create().unwrap();
        assert!(registry.remove(0));
        let again = registry.create().unwrap();
        assert_eq!(again.id(), 0);
    }

    #[test]
    fn test_get() {
        let registry = registry();
        let created = registry.create().unwrap();
        let found = registry.get(created.id()).unwrap();
        assert!(Arc::ptr_eq(&created, &found));
        assert!(registry.get(99).is_none());
    }

    #[test]
    fn test_get_or_create_instantiates_on_demand() {
        let registry = registry();
        assert!(registry.get(5).is_none());
        let device = registry.get_or_create(5).unwrap();
        assert_eq!(device.id(), 5);

        let same = registry.get_or_create(5).unwrap();
        assert!(Arc::ptr_eq(&device, &same));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_missing_device() {
        let registry = registry();
        assert!(!registry.remove(3));
    }

    #[test]
    fn test_remove_frees_pages() {
        let registry = registry();
        let device = registry.create().unwrap();
        device.write_page(0, &[0xEE; PAGE_SIZE]).unwrap();
        assert_eq!(device.stats().pages_resident, 1);

        assert!(registry.remove(device.id()));
        assert_eq!(device.stats().pages_resident, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_sorted_by_id() {
        let registry = registry();
        registry.get_or_create(4).unwrap();
        registry.get_or_create(1).unwrap();
        registry.get_or_create(2).unwrap();
        let ids: Vec<u32> = registry.list().iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }

    #[test]
    fn test_invalid_config_size_surfaces() {
        let registry = DeviceRegistry::new(DeviceConfig { size: 100 });
        assert!(matches!(
            registry.create(),
            Err(Error::InvalidArgument(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_default_config_size() {
        let config = DeviceConfig::default();
        assert_eq!(config.size, 4 << 20);
    }
}
