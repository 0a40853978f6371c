//! rbd-brokerd - HTTP front end of the RBD broker.
//!
//! Exposes image provisioning and lock management as a REST API guarded by
//! HTTP basic authentication.

#![warn(missing_docs)]

pub mod api;
pub mod config;

pub use api::AppState;
pub use config::{Args, Config, Credentials};
