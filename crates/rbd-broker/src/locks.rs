//! Lock inventory and reclaim.
//!
//! `rbd lock list <image>` prints a two-line banner followed by one line per
//! lock:
//!
//! ```text
//! There is 1 exclusive lock on this image.
//! Locker      ID                                  Address
//! client.4239 kubelet_lock_magic_worker-1.cluster 10.0.2.190:0/3340152652
//! ```
//!
//! The banner is skipped by position. Data lines are accepted or dropped by
//! token count alone, so a malformed line never fails the inventory.

use std::sync::Arc;

use rbd_common::{BrokerResult, Lock, ToolPaths};

use crate::exec::{CommandRunner, Step, invoke_checked};

/// Prefix of diagnostic lines the tool mixes into its output.
pub const WARNING_PREFIX: &str = "warning:";

/// Number of banner lines preceding lock rows.
const BANNER_LINES: usize = 2;

/// Minimum tokens in a lock row: locker, id, address.
const LOCK_FIELDS: usize = 3;

/// Lists the locks held on every image in the pool.
pub struct LockInventory {
    runner: Arc<dyn CommandRunner>,
    paths: ToolPaths,
}

impl LockInventory {
    /// Create an inventory.
    pub fn new(runner: Arc<dyn CommandRunner>, paths: ToolPaths) -> Self {
        Self { runner, paths }
    }

    /// List all images, then the locks of each, in tool order.
    ///
    /// # Errors
    ///
    /// Returns [`rbd_common::BrokerError::Execution`] as soon as any command
    /// fails; no partial result is returned.
    pub async fn list_all(&self) -> BrokerResult<Vec<Lock>> {
        let images = self.list_images().await?;
        tracing::debug!(count = images.len(), "Listing locks");

        let mut locks = Vec::new();
        for image in &images {
            locks.extend(self.list_image_locks(image).await?);
        }

        tracing::info!(images = images.len(), locks = locks.len(), "Lock inventory complete");
        Ok(locks)
    }

    /// Names of all images in the pool.
    ///
    /// # Errors
    ///
    /// Returns an execution error if `rbd list` fails.
    pub async fn list_images(&self) -> BrokerResult<Vec<String>> {
        let output = invoke_checked(
            self.runner.as_ref(),
            Step::List,
            self.paths.rbd(),
            vec!["list".to_string()],
            || "cannot list RBD images".to_string(),
        )
        .await?;
        Ok(parse_image_list(&output.output))
    }

    /// Locks held on one image.
    ///
    /// # Errors
    ///
    /// Returns an execution error if `rbd lock list` fails.
    pub async fn list_image_locks(&self, image: &str) -> BrokerResult<Vec<Lock>> {
        let args = vec!["lock".to_string(), "list".to_string(), image.to_string()];
        let output = invoke_checked(
            self.runner.as_ref(),
            Step::LockList,
            self.paths.rbd(),
            args,
            || format!("cannot list locks of RBD image {image:?}"),
        )
        .await?;

        let locks = parse_lock_list(image, &output.output);
        tracing::debug!(image, count = locks.len(), "Parsed image locks");
        Ok(locks)
    }
}

/// Removes locks.
pub struct LockReclaimer {
    runner: Arc<dyn CommandRunner>,
    paths: ToolPaths,
}

impl LockReclaimer {
    /// Create a reclaimer.
    pub fn new(runner: Arc<dyn CommandRunner>, paths: ToolPaths) -> Self {
        Self { runner, paths }
    }

    /// Forcibly remove the lock `lock_name` held by `locker` on `image`.
    ///
    /// There is no existence check; a missing lock surfaces as a tool
    /// failure like any other.
    ///
    /// # Errors
    ///
    /// Returns [`rbd_common::BrokerError::Execution`] if the command fails.
    pub async fn release(&self, image: &str, lock_name: &str, locker: &str) -> BrokerResult<()> {
        tracing::info!(image, lock = lock_name, locker, "Removing lock");

        let args = vec![
            "lock".to_string(),
            "remove".to_string(),
            image.to_string(),
            lock_name.to_string(),
            locker.to_string(),
        ];
        invoke_checked(self.runner.as_ref(), Step::LockRemove, self.paths.rbd(), args, || {
            format!("cannot remove lock {lock_name:?} held by {locker:?} on RBD image {image:?}")
        })
        .await
        .inspect_err(|e| tracing::warn!(image, lock = lock_name, error = %e, "Lock removal failed"))?;

        tracing::info!(image, lock = lock_name, "Lock removed");
        Ok(())
    }
}

/// Whether a line is tool noise rather than data.
#[must_use]
pub fn is_noise(line: &str) -> bool {
    line.trim_start()
        .get(..WARNING_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(WARNING_PREFIX))
}

/// Non-blank lines that are not tool noise.
pub(crate) fn data_lines(output: &str) -> impl Iterator<Item = &str> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty() && !is_noise(line))
}

/// Parse `rbd list` output into image names, keeping tool order.
#[must_use]
pub fn parse_image_list(output: &str) -> Vec<String> {
    data_lines(output).map(str::to_string).collect()
}

/// Parse `rbd lock list <image>` output.
#[must_use]
pub fn parse_lock_list(image: &str, output: &str) -> Vec<Lock> {
    data_lines(output)
        .skip(BANNER_LINES)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < LOCK_FIELDS {
                tracing::debug!(image, line, "Skipping malformed lock line");
                return None;
            }
            Some(Lock::new(image, fields[1], fields[0], fields[2]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::testing::ScriptedRunner;
    use proptest::prelude::*;
    use rbd_common::BrokerError;

    const RBD: &str = "/usr/bin/rbd";

    const IMAGE1: &str = "sampleImage1";
    const LOCKER1: &str = "client.4175";
    const ID1: &str = "kubelet_lock_magic_compute-worker-2.instance";
    const ADDRESS1: &str = "10.0.2.153:0/3412117426";

    const IMAGE2: &str = "sampleImage2";
    const LOCKER2: &str = "client.4275";
    const ID2: &str = "kubelet_lock_magic_compute-worker-3.instance";
    const ADDRESS2: &str = "10.0.2.154:0/3412117427";

    fn lock_list(rows: &[&str]) -> String {
        let mut lines = vec![
            "Locker\tID\tAddress".to_string(),
            format!("There is {} exclusive lock on this image.", rows.len()),
        ];
        lines.extend(rows.iter().map(ToString::to_string));
        lines.join("\n")
    }

    fn lock_row(locker: &str, id: &str, address: &str) -> String {
        format!("{locker} {id} {address}")
    }

    fn inventory(runner: &Arc<ScriptedRunner>) -> LockInventory {
        LockInventory::new(runner.clone(), ToolPaths::new())
    }

    #[tokio::test]
    async fn no_images_yields_no_locks() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.expect(RBD, &["list"], CommandOutput::ok("\n"));

        let locks = inventory(&runner).list_all().await.unwrap();

        assert!(locks.is_empty());
        assert_eq!(runner.calls().len(), 1);
        runner.assert_done();
    }

    #[tokio::test]
    async fn wrong_lock_list_output_yields_no_locks() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.expect(RBD, &["list"], CommandOutput::ok(format!("{IMAGE1}\n")));
        runner.expect(RBD, &["lock", "list", IMAGE1], CommandOutput::ok("some wrong output"));

        let locks = inventory(&runner).list_all().await.unwrap();
        assert!(locks.is_empty());
        runner.assert_done();
    }

    #[tokio::test]
    async fn one_image_with_two_locks() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.expect(RBD, &["list"], CommandOutput::ok(format!("{IMAGE1}\n")));
        runner.expect(
            RBD,
            &["lock", "list", IMAGE1],
            CommandOutput::ok(lock_list(&[
                &lock_row(LOCKER1, ID1, ADDRESS1),
                &lock_row(LOCKER2, ID2, ADDRESS2),
            ])),
        );

        let locks = inventory(&runner).list_all().await.unwrap();

        assert_eq!(
            locks,
            vec![
                Lock::new(IMAGE1, ID1, LOCKER1, ADDRESS1),
                Lock::new(IMAGE1, ID2, LOCKER2, ADDRESS2),
            ]
        );
        runner.assert_done();
    }

    #[tokio::test]
    async fn locks_follow_image_order() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.expect(RBD, &["list"], CommandOutput::ok(format!("{IMAGE1}\n{IMAGE2}\n")));
        runner.expect(
            RBD,
            &["lock", "list", IMAGE1],
            CommandOutput::ok(lock_list(&[&lock_row(LOCKER1, ID1, ADDRESS1)])),
        );
        runner.expect(
            RBD,
            &["lock", "list", IMAGE2],
            CommandOutput::ok(lock_list(&[&lock_row(LOCKER2, ID2, ADDRESS2)])),
        );

        let locks = inventory(&runner).list_all().await.unwrap();

        assert_eq!(
            locks,
            vec![
                Lock::new(IMAGE1, ID1, LOCKER1, ADDRESS1),
                Lock::new(IMAGE2, ID2, LOCKER2, ADDRESS2),
            ]
        );
        runner.assert_done();
    }

    #[tokio::test]
    async fn failing_lock_list_fails_inventory() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.expect(RBD, &["list"], CommandOutput::ok(format!("{IMAGE1}\n{IMAGE2}\n")));
        runner.expect(
            RBD,
            &["lock", "list", IMAGE1],
            CommandOutput::ok(lock_list(&[&lock_row(LOCKER1, ID1, ADDRESS1)])),
        );
        runner.expect(RBD, &["lock", "list", IMAGE2], CommandOutput::failed("some error"));

        let err = inventory(&runner).list_all().await.unwrap_err();

        assert!(matches!(err, BrokerError::Execution { ref step, .. } if step == "lock list"));
        runner.assert_done();
    }

    #[tokio::test]
    async fn failing_image_list_fails_inventory() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.expect(RBD, &["list"], CommandOutput::failed("some error"));

        let err = inventory(&runner).list_all().await.unwrap_err();
        assert!(matches!(err, BrokerError::Execution { ref step, .. } if step == "list"));
    }

    #[tokio::test]
    async fn release_passes_key_in_order() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.expect(RBD, &["lock", "remove", IMAGE1, ID1, LOCKER1], CommandOutput::ok(""));

        LockReclaimer::new(runner.clone(), ToolPaths::new())
            .release(IMAGE1, ID1, LOCKER1)
            .await
            .unwrap();
        runner.assert_done();
    }

    #[tokio::test]
    async fn release_failure_is_execution_error() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.expect(
            RBD,
            &["lock", "remove", IMAGE1, ID1, LOCKER1],
            CommandOutput::failed("rbd: releasing lock failed: (2) No such file or directory"),
        );

        let err = LockReclaimer::new(runner.clone(), ToolPaths::new())
            .release(IMAGE1, ID1, LOCKER1)
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Execution { .. }));
    }

    #[test]
    fn image_list_drops_blank_and_noise_lines() {
        let output = "  \nwarning: line 21: 'osd_pool_default_size' in section 'global' redefined\nvol1\n\n  WARNING: unable to open config\nvol2\n";
        assert_eq!(parse_image_list(output), vec!["vol1", "vol2"]);
    }

    #[test]
    fn banner_is_skipped_by_position() {
        // Banner lines are not matched by content.
        let output = "anything at all here\nand here\nclient.1 id1 10.0.0.1:0/1\n";
        assert_eq!(
            parse_lock_list("vol", output),
            vec![Lock::new("vol", "id1", "client.1", "10.0.0.1:0/1")]
        );
    }

    #[test]
    fn noise_does_not_count_towards_banner() {
        let output = format!(
            "warning: something odd\n\n{}",
            lock_list(&[&lock_row(LOCKER1, ID1, ADDRESS1)])
        );
        assert_eq!(
            parse_lock_list(IMAGE1, &output),
            vec![Lock::new(IMAGE1, ID1, LOCKER1, ADDRESS1)]
        );
    }

    #[test]
    fn short_lines_are_dropped() {
        let output = lock_list(&[
            &lock_row(LOCKER1, ID1, ADDRESS1),
            "client.9 orphan",
            &format!("{LOCKER2} {ID2} {ADDRESS2} trailing extra"),
        ]);
        assert_eq!(
            parse_lock_list(IMAGE1, &output),
            vec![
                Lock::new(IMAGE1, ID1, LOCKER1, ADDRESS1),
                Lock::new(IMAGE1, ID2, LOCKER2, ADDRESS2),
            ]
        );
    }

    #[test]
    fn noise_detection() {
        assert!(is_noise("warning: x"));
        assert!(is_noise("   Warning: x"));
        assert!(!is_noise("warning-volume"));
        assert!(!is_noise("vol1"));
        assert!(!is_noise("wär"));
    }

    proptest! {
        #[test]
        fn parsed_locks_are_bounded_by_rows(
            banner in proptest::collection::vec("[a-zA-Z][a-zA-Z .]{0,19}", 2),
            rows in proptest::collection::vec("[a-z0-9.]{1,8}( [a-z0-9.:/]{1,8}){0,4}", 0..8),
        ) {
            let mut lines = banner.clone();
            lines.extend(rows.iter().cloned());
            let locks = parse_lock_list("vol", &lines.join("\n"));

            let expected = rows
                .iter()
                .filter(|row| row.split_whitespace().count() >= LOCK_FIELDS)
                .count();
            prop_assert_eq!(locks.len(), expected);
            for lock in &locks {
                prop_assert_eq!(lock.image_name.as_str(), "vol");
                prop_assert!(!lock.address.is_empty());
            }
        }
    }
}
