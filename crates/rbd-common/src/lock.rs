//! Exclusive locks held on RBD images by remote clients.

use serde::{Deserialize, Serialize};

/// An exclusive lock as reported by `rbd lock list`.
///
/// Locks are never stored; every inventory request recomputes them.
/// `image_name`, `lock_name` and `locker` together identify a lock for removal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    /// Image the lock is held on.
    pub image_name: String,
    /// Lock id chosen by the client.
    pub lock_name: String,
    /// Client entity holding the lock, e.g. `client.4239`.
    pub locker: String,
    /// Network address of the locker.
    #[serde(default)]
    pub address: String,
}

impl Lock {
    /// Create a lock record.
    pub fn new(
        image_name: impl Into<String>,
        lock_name: impl Into<String>,
        locker: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            image_name: image_name.into(),
            lock_name: lock_name.into(),
            locker: locker.into(),
            address: address.into(),
        }
    }
}
