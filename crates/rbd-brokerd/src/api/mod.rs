//! HTTP API.

pub mod auth;
pub mod error;
pub mod lock;
pub mod rbd;
pub mod server;

use std::sync::Arc;

use rbd_broker::Broker;

use crate::config::Credentials;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broker components.
    pub broker: Arc<Broker>,
    /// Accepted basic authentication credentials.
    pub credentials: Arc<Credentials>,
}

impl AppState {
    /// Create handler state.
    pub fn new(broker: Broker, credentials: Credentials) -> Self {
        Self {
            broker: Arc::new(broker),
            credentials: Arc::new(credentials),
        }
    }
}
