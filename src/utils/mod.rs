//! Shared utilities and error types

pub mod error;

pub use error::{Result, SyncError, TransferFailure};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, used as the override ordering key
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
