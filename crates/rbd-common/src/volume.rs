//! RBD volume descriptors and the supported filesystems.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, BrokerResult};

/// Filesystem a freshly provisioned volume is formatted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSystem {
    /// ext4.
    Ext4,
    /// XFS.
    Xfs,
}

impl FileSystem {
    /// All supported filesystems.
    pub const ALL: [Self; 2] = [Self::Ext4, Self::Xfs];

    /// Name as used on the wire and in formatter binaries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ext4 => "ext4",
            Self::Xfs => "xfs",
        }
    }

    /// Binary that formats a block device with this filesystem.
    #[must_use]
    pub const fn formatter(self) -> &'static str {
        match self {
            Self::Ext4 => "mkfs.ext4",
            Self::Xfs => "mkfs.xfs",
        }
    }
}

impl fmt::Display for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileSystem {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|fs| fs.as_str() == s)
            .ok_or_else(|| {
                BrokerError::validation(format!(
                    "unsupported filesystem {s:?}, expected one of: ext4, xfs"
                ))
            })
    }
}

/// A provisioned RBD image.
///
/// The broker keeps no copy of this; it is an echo of validated input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Image name, unique within the pool.
    pub image_name: String,
    /// Requested size as passed to `rbd create --size`.
    pub size: u64,
    /// Filesystem the image was formatted with.
    pub file_system: FileSystem,
}

/// Unvalidated provisioning request as decoded from the wire.
///
/// Missing fields decode to empty values so that they are reported by
/// [`VolumeRequest::validate`] rather than by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeRequest {
    /// Image name.
    pub image_name: String,
    /// Image size.
    pub size: u64,
    /// Filesystem name.
    pub file_system: String,
}

impl VolumeRequest {
    /// Create a request.
    pub fn new(image_name: impl Into<String>, size: u64, file_system: impl Into<String>) -> Self {
        Self {
            image_name: image_name.into(),
            size,
            file_system: file_system.into(),
        }
    }

    /// Check the request and turn it into a typed [`Volume`].
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Validation`] if the name is empty, the size is
    /// zero or the filesystem is not supported.
    pub fn validate(&self) -> BrokerResult<Volume> {
        validate_image_name(&self.image_name)?;
        if self.size == 0 {
            return Err(BrokerError::validation("rbd size cannot be zero"));
        }
        let file_system = self.file_system.parse()?;
        Ok(Volume {
            image_name: self.image_name.clone(),
            size: self.size,
            file_system,
        })
    }
}

impl From<Volume> for VolumeRequest {
    fn from(volume: Volume) -> Self {
        Self {
            image_name: volume.image_name,
            size: volume.size,
            file_system: volume.file_system.as_str().to_string(),
        }
    }
}

/// Reject empty image names.
///
/// # Errors
///
/// Returns [`BrokerError::Validation`] for an empty name.
pub fn validate_image_name(name: &str) -> BrokerResult<()> {
    if name.is_empty() {
        return Err(BrokerError::validation("rbd image name is empty"));
    }
    Ok(())
}
