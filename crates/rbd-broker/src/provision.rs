//! Volume provisioning: create, map, format, unmap.

use std::sync::Arc;

use rbd_common::{BrokerError, BrokerResult, ToolPaths, Volume, VolumeRequest};

use crate::exec::{CommandRunner, Step, invoke_checked};
use crate::locks::data_lines;

/// Feature set every image is created with.
pub const IMAGE_FEATURE: &str = "layering";

/// Creates and formats RBD images.
pub struct DeviceProvisioner {
    runner: Arc<dyn CommandRunner>,
    paths: ToolPaths,
}

impl DeviceProvisioner {
    /// Create a provisioner.
    pub fn new(runner: Arc<dyn CommandRunner>, paths: ToolPaths) -> Self {
        Self { runner, paths }
    }

    /// Provision a formatted image.
    ///
    /// Input is validated before any command runs. The four steps run in
    /// order and the first failure aborts the sequence. Nothing is rolled
    /// back: a failure after `create` leaves the image allocated.
    ///
    /// # Errors
    ///
    /// [`BrokerError::Validation`] for bad input, [`BrokerError::Execution`]
    /// naming the failed step otherwise.
    pub async fn provision(&self, request: &VolumeRequest) -> BrokerResult<Volume> {
        let volume = request.validate()?;
        let name = volume.image_name.as_str();
        tracing::info!(image = name, size = volume.size, fs = %volume.file_system, "Provisioning RBD image");

        self.create(name, volume.size).await?;
        let device = self.map(name).await?;
        self.format(&device, &volume).await?;
        self.unmap(name).await?;

        tracing::info!(image = name, "RBD image provisioned");
        Ok(volume)
    }

    async fn create(&self, name: &str, size: u64) -> BrokerResult<()> {
        let args = vec![
            "create".to_string(),
            name.to_string(),
            format!("--size={size}"),
            format!("--image-feature={IMAGE_FEATURE}"),
        ];
        invoke_checked(self.runner.as_ref(), Step::Create, self.paths.rbd(), args, || {
            format!("cannot create RBD image with name {name:?} and size {size}")
        })
        .await?;
        Ok(())
    }

    /// Map the image and return the device path printed by `rbd map`.
    async fn map(&self, name: &str) -> BrokerResult<String> {
        let args = vec!["map".to_string(), name.to_string()];
        let output = invoke_checked(self.runner.as_ref(), Step::Map, self.paths.rbd(), args, || {
            format!("cannot map RBD image {name:?}")
        })
        .await?;

        let device = device_path(&output.output).ok_or_else(|| {
            BrokerError::execution(
                Step::Map.to_string(),
                format!(
                    "cannot map RBD image {name:?}: expected one device path, got {:?}",
                    output.output.trim()
                ),
            )
        })?;
        tracing::debug!(image = name, device = %device, "RBD image mapped");
        Ok(device)
    }

    async fn format(&self, device: &str, volume: &Volume) -> BrokerResult<()> {
        let formatter = self.paths.formatter(volume.file_system);
        let args = vec![device.to_string()];
        invoke_checked(self.runner.as_ref(), Step::Format, &formatter, args, || {
            format!("cannot format device {device:?}")
        })
        .await?;
        Ok(())
    }

    async fn unmap(&self, name: &str) -> BrokerResult<()> {
        let args = vec!["unmap".to_string(), name.to_string()];
        invoke_checked(self.runner.as_ref(), Step::Unmap, self.paths.rbd(), args, || {
            format!("cannot unmap RBD image {name:?}")
        })
        .await?;
        Ok(())
    }
}

/// The device path printed by `rbd map`: the only line left once blank and
/// warning lines are dropped.
fn device_path(output: &str) -> Option<String> {
    let mut lines = data_lines(output).map(str::trim);
    match (lines.next(), lines.next()) {
        (Some(device), None) => Some(device.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::testing::ScriptedRunner;

    const RBD: &str = "/usr/bin/rbd";

    fn provisioner(runner: &Arc<ScriptedRunner>) -> DeviceProvisioner {
        DeviceProvisioner::new(runner.clone(), ToolPaths::new())
    }

    fn expect_create(runner: &ScriptedRunner, result: CommandOutput) {
        runner.expect(
            RBD,
            &["create", "sampleRBD", "--size=1000", "--image-feature=layering"],
            result,
        );
    }

    #[test_log::test(tokio::test)]
    async fn provision_runs_all_steps_in_order() {
        let runner = Arc::new(ScriptedRunner::new());
        expect_create(&runner, CommandOutput::ok(""));
        runner.expect(RBD, &["map", "sampleRBD"], CommandOutput::ok("/dev/rbd1\n"));
        runner.expect("/sbin/mkfs.xfs", &["/dev/rbd1"], CommandOutput::ok(""));
        runner.expect(RBD, &["unmap", "sampleRBD"], CommandOutput::ok(""));

        let request = VolumeRequest::new("sampleRBD", 1000, "xfs");
        let volume = provisioner(&runner).provision(&request).await.unwrap();

        assert_eq!(VolumeRequest::from(volume), request);
        runner.assert_done();
    }

    #[tokio::test]
    async fn provision_uses_ext4_formatter() {
        let runner = Arc::new(ScriptedRunner::new());
        expect_create(&runner, CommandOutput::ok(""));
        runner.expect(RBD, &["map", "sampleRBD"], CommandOutput::ok("  /dev/rbd7  "));
        runner.expect("/sbin/mkfs.ext4", &["/dev/rbd7"], CommandOutput::ok(""));
        runner.expect(RBD, &["unmap", "sampleRBD"], CommandOutput::ok(""));

        let request = VolumeRequest::new("sampleRBD", 1000, "ext4");
        provisioner(&runner).provision(&request).await.unwrap();
        runner.assert_done();
    }

    #[tokio::test]
    async fn provision_stops_when_format_fails() {
        let runner = Arc::new(ScriptedRunner::new());
        expect_create(&runner, CommandOutput::ok(""));
        runner.expect(RBD, &["map", "sampleRBD"], CommandOutput::ok("/dev/rbd1"));
        runner.expect("/sbin/mkfs.xfs", &["/dev/rbd1"], CommandOutput::failed("some error!"));

        let request = VolumeRequest::new("sampleRBD", 1000, "xfs");
        let err = provisioner(&runner).provision(&request).await.unwrap_err();

        assert!(matches!(err, BrokerError::Execution { ref step, .. } if step == "format"));
        assert!(err.to_string().contains("some error!"));
        assert_eq!(runner.calls().len(), 3);
        runner.assert_done();
    }

    #[tokio::test]
    async fn provision_stops_when_create_fails() {
        let runner = Arc::new(ScriptedRunner::new());
        expect_create(&runner, CommandOutput::failed("rbd: create error: (17) File exists"));

        let request = VolumeRequest::new("sampleRBD", 1000, "xfs");
        let err = provisioner(&runner).provision(&request).await.unwrap_err();

        assert!(matches!(err, BrokerError::Execution { ref step, .. } if step == "create"));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn provision_launch_failure_is_execution_error() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.expect_launch_failure(
            RBD,
            &["create", "sampleRBD", "--size=1000", "--image-feature=layering"],
        );

        let request = VolumeRequest::new("sampleRBD", 1000, "xfs");
        let err = provisioner(&runner).provision(&request).await.unwrap_err();
        assert!(matches!(err, BrokerError::Execution { .. }));
    }

    #[tokio::test]
    async fn provision_rejects_invalid_input_without_commands() {
        let runner = Arc::new(ScriptedRunner::new());
        let requests = [
            VolumeRequest::new("", 1000, "xfs"),
            VolumeRequest::new("sampleRBD", 0, "xfs"),
            VolumeRequest::new("sampleRBD", 1000, "btrfs"),
        ];

        for request in requests {
            let err = provisioner(&runner).provision(&request).await.unwrap_err();
            assert!(matches!(err, BrokerError::Validation { .. }));
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn provision_ignores_warnings_in_map_output() {
        let runner = Arc::new(ScriptedRunner::new());
        expect_create(&runner, CommandOutput::ok(""));
        runner.expect(
            RBD,
            &["map", "sampleRBD"],
            CommandOutput::ok(
                "warning: line 21: 'osd_pool_default_size' in section 'global' redefined\n/dev/rbd1\n",
            ),
        );
        runner.expect("/sbin/mkfs.xfs", &["/dev/rbd1"], CommandOutput::ok(""));
        runner.expect(RBD, &["unmap", "sampleRBD"], CommandOutput::ok(""));

        let request = VolumeRequest::new("sampleRBD", 1000, "xfs");
        provisioner(&runner).provision(&request).await.unwrap();
        runner.assert_done();
    }

    #[tokio::test]
    async fn provision_fails_without_single_device_path() {
        for output in ["", "  \n\n", "WARNING: only noise\n", "/dev/rbd1\n/dev/rbd2\n"] {
            let runner = Arc::new(ScriptedRunner::new());
            expect_create(&runner, CommandOutput::ok(""));
            runner.expect(RBD, &["map", "sampleRBD"], CommandOutput::ok(output));

            let request = VolumeRequest::new("sampleRBD", 1000, "xfs");
            let err = provisioner(&runner).provision(&request).await.unwrap_err();

            assert!(
                matches!(err, BrokerError::Execution { ref step, .. } if step == "map"),
                "{output:?}: {err:?}"
            );
            assert_eq!(runner.calls().len(), 2, "{output:?}");
            runner.assert_done();
        }
    }

    #[test]
    fn device_path_parsing() {
        assert_eq!(device_path("/dev/rbd0\n").as_deref(), Some("/dev/rbd0"));
        assert_eq!(device_path("\n  /dev/rbd3  \n\n").as_deref(), Some("/dev/rbd3"));
        assert_eq!(
            device_path("Warning: deprecated option\n/dev/rbd4").as_deref(),
            Some("/dev/rbd4")
        );
        assert_eq!(device_path(""), None);
        assert_eq!(device_path("/dev/rbd1\n/dev/rbd2"), None);
    }
}
