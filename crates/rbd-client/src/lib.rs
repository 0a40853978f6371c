//! # rbd-client
//!
//! Typed client for the RBD broker HTTP API.

#![warn(missing_docs)]

pub mod error;

use rbd_common::{Lock, Volume, VolumeRequest};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;

pub use error::{ClientError, ClientResult};

/// API prefix the client talks to.
pub const API_PREFIX: [&str; 2] = ["api", "v1"];

/// Broker client authenticating with HTTP basic credentials.
#[derive(Debug, Clone)]
pub struct CephBroker {
    /// Base address, e.g. `http://ceph-broker:8080`.
    pub address: String,
    /// Basic auth username.
    pub username: String,
    /// Basic auth password.
    pub password: String,
    base: Url,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl CephBroker {
    /// Create a client for the broker at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidAddress`] if `address` is not a URL that
    /// can carry a path.
    pub fn new_basic_auth(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> ClientResult<Self> {
        let address = address.into();
        let base = Url::parse(&address)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ClientError::InvalidAddress(address.clone()))?;

        Ok(Self {
            address,
            username: username.into(),
            password: password.into(),
            base,
            client: Client::new(),
        })
    }

    /// Provision a formatted image.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] with the broker's status and message on
    /// any non-success response.
    pub async fn create_rbd(&self, request: &VolumeRequest) -> ClientResult<Volume> {
        let url = self.url(&["rbd"]);
        tracing::debug!(url = %url, image = %request.image_name, "Creating RBD image");

        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(request)
            .send()
            .await?;
        let response = check(response, StatusCode::OK).await?;
        Ok(response.json().await?)
    }

    /// Remove an image. Returns the success status (`204 No Content`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] on failure; status `404` means the
    /// image does not exist.
    pub async fn delete_rbd(&self, image_name: &str) -> ClientResult<StatusCode> {
        let url = self.url(&["rbd", image_name]);
        tracing::debug!(url = %url, "Deleting RBD image");

        let response = self
            .client
            .delete(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        Ok(check(response, StatusCode::NO_CONTENT).await?.status())
    }

    /// List all locks on all images.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] on any non-success response.
    pub async fn list_locks(&self) -> ClientResult<Vec<Lock>> {
        let url = self.url(&["lock"]);
        tracing::debug!(url = %url, "Listing locks");

        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        let response = check(response, StatusCode::OK).await?;
        Ok(response.json().await?)
    }

    /// Force-release a lock. Returns the success status (`204 No Content`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] on any non-success response.
    pub async fn delete_lock(&self, lock: &Lock) -> ClientResult<StatusCode> {
        let url = self.url(&["lock", &lock.image_name, &lock.lock_name, &lock.locker]);
        tracing::debug!(url = %url, "Deleting lock");

        let response = self
            .client
            .delete(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        Ok(check(response, StatusCode::NO_CONTENT).await?.status())
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(API_PREFIX).extend(segments);
        }
        url
    }
}

/// Pass through the expected status, turn anything else into an error.
async fn check(response: Response, expected: StatusCode) -> ClientResult<Response> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);
    tracing::debug!(%status, message = %message, "Broker returned an error");
    Err(ClientError::Status { status, message })
}
