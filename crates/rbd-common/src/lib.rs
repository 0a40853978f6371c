//! # rbd-common
//!
//! Shared types for the RBD broker.
//!
//! This crate provides the pieces every other broker crate agrees on:
//! - Volume and lock records as they travel over the wire
//! - The closed set of supported filesystems
//! - Locations of the external tools the broker drives
//! - Common error types

#![warn(missing_docs)]

pub mod error;
pub mod lock;
pub mod paths;
pub mod volume;

pub use error::{BrokerError, BrokerResult};
pub use lock::Lock;
pub use paths::ToolPaths;
pub use volume::{FileSystem, Volume, VolumeRequest};
