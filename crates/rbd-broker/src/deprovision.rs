//! Volume removal.

use std::sync::Arc;

use rbd_common::volume::validate_image_name;
use rbd_common::{BrokerError, BrokerResult, ToolPaths};

use crate::exec::{CommandRunner, Step, invoke};

/// Removes RBD images.
pub struct DeviceDeprovisioner {
    runner: Arc<dyn CommandRunner>,
    paths: ToolPaths,
}

impl DeviceDeprovisioner {
    /// Create a deprovisioner.
    pub fn new(runner: Arc<dyn CommandRunner>, paths: ToolPaths) -> Self {
        Self { runner, paths }
    }

    /// Remove an image.
    ///
    /// # Errors
    ///
    /// [`BrokerError::Validation`] for an empty name, [`BrokerError::NotFound`]
    /// when the tool reports the image absent, [`BrokerError::Execution`] for
    /// any other failure.
    pub async fn remove(&self, name: &str) -> BrokerResult<()> {
        validate_image_name(name)?;
        tracing::info!(image = name, "Removing RBD image");

        let args = vec!["remove".to_string(), name.to_string()];
        let output = invoke(self.runner.as_ref(), Step::Remove, self.paths.rbd(), args).await?;

        if output.success {
            tracing::info!(image = name, "RBD image removed");
            return Ok(());
        }
        if is_not_found(&output.output) {
            tracing::info!(image = name, "RBD image does not exist");
            return Err(BrokerError::NotFound {
                image: name.to_string(),
            });
        }

        tracing::warn!(image = name, output = %output.output, "Failed to remove RBD image");
        Err(BrokerError::execution(
            Step::Remove.to_string(),
            format!("cannot delete RBD image {name:?}: {}", output.output.trim()),
        ))
    }
}

/// Whether tool output says the target does not exist.
#[must_use]
pub fn is_not_found(output: &str) -> bool {
    const NOT_FOUND: &str = "no such file";
    output.to_ascii_lowercase().contains(NOT_FOUND)
}
