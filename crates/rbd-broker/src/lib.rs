//! # rbd-broker
//!
//! Ceph RBD volume provisioning and lock management.
//!
//! All state lives in the cluster and is reached through the `rbd` tool. The
//! components here drive that tool through an injected [`CommandRunner`]:
//! - [`DeviceProvisioner`]: create, map, format and unmap a new image
//! - [`DeviceDeprovisioner`]: remove an image
//! - [`LockInventory`]: list the locks held on every image
//! - [`LockReclaimer`]: forcibly remove a lock

#![warn(missing_docs)]

pub mod deprovision;
pub mod exec;
pub mod locks;
pub mod provision;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::Arc;

use rbd_common::ToolPaths;

pub use deprovision::DeviceDeprovisioner;
pub use exec::{CommandOutput, CommandRunner, Step, SystemRunner};
pub use locks::{LockInventory, LockReclaimer};
pub use provision::DeviceProvisioner;

/// The four broker components sharing one runner and tool configuration.
pub struct Broker {
    /// Image provisioning.
    pub provisioner: DeviceProvisioner,
    /// Image removal.
    pub deprovisioner: DeviceDeprovisioner,
    /// Lock listing.
    pub inventory: LockInventory,
    /// Lock removal.
    pub reclaimer: LockReclaimer,
}

impl Broker {
    /// Build all components around `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>, paths: &ToolPaths) -> Self {
        Self {
            provisioner: DeviceProvisioner::new(runner.clone(), paths.clone()),
            deprovisioner: DeviceDeprovisioner::new(runner.clone(), paths.clone()),
            inventory: LockInventory::new(runner.clone(), paths.clone()),
            reclaimer: LockReclaimer::new(runner, paths.clone()),
        }
    }
}
