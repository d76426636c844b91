//! Error types for rambrick-core.

use thiserror::Error;

/// Errors surfaced by the block engine.
///
/// Every failure is a synchronous return value; the engine never retries on
/// its own. The enum is `Clone + Eq` so a completed request can retain the
/// error it finished with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A backing page could not be allocated. Reported as "no space" at the
    /// block boundary even though device capacity is notional: the device is
    /// sparse, so this is allocator exhaustion, not capacity exhaustion.
    #[error("out of memory allocating backing page")]
    OutOfMemory,

    /// The request extends past device capacity.
    #[error("request ends at sector {end_sector}, capacity is {capacity_sectors} sectors")]
    OutOfRange {
        /// First sector past the end of the request.
        end_sector: u64,
        /// Device capacity in sectors.
        capacity_sectors: u64,
    },

    /// A purge was requested while another opener holds the device.
    #[error("device busy: another opener holds the device")]
    Busy,

    /// A parameter violates the block-layer boundary contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_out_of_memory() {
        let err = Error::OutOfMemory;
        assert!(err.to_string().contains("out of memory"));
    }

    #[test]
    fn test_error_display_out_of_range() {
        let err = Error::OutOfRange {
            end_sector: 40,
            capacity_sectors: 32,
        };
        let msg = err.to_string();
        assert!(msg.contains("40"));
        assert!(msg.contains("32"));
    }

    #[test]
    fn test_error_display_busy() {
        let err = Error::Busy;
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn test_error_display_invalid_argument() {
        let err = Error::InvalidArgument("segment length 100 not sector aligned".to_string());
        let msg = err.to_string();
        assert!(msg.contains("invalid argument"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn test_error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }

    #[test]
    fn test_error_clone_eq() {
        let err = Error::Busy;
        assert_eq!(err.clone(), Error::Busy);
        assert_ne!(err, Error::OutOfMemory);
    }
}
