//! Standard filesystem paths for volmount.

use std::path::PathBuf;

use once_cell::sync::Lazy;

use crate::id::VolumeId;

/// Default root under which volumes are mounted.
pub static VOLMOUNT_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("VOLMOUNT_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/mnt/ebs"))
});

/// Directory holding block device nodes.
pub const DEV_ROOT: &str = "/dev";

/// Standard paths used when attaching and mounting volumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolmountPaths {
    /// Root directory for mountpoints (default: /mnt/ebs).
    pub mount_root: PathBuf,
    /// Directory in which the kernel surfaces device nodes (default: /dev).
    pub dev_root: PathBuf,
}

impl VolmountPaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom mount root.
    #[must_use]
    pub fn with_mount_root(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
            dev_root: PathBuf::from(DEV_ROOT),
        }
    }

    /// Mountpoint for a volume: `<mount-root>/<volume-id>`.
    #[must_use]
    pub fn mountpoint(&self, volume: &VolumeId) -> PathBuf {
        self.mount_root.join(volume.as_str())
    }
}

impl Default for VolmountPaths {
    fn default() -> Self {
        Self {
            mount_root: VOLMOUNT_ROOT.clone(),
            dev_root: PathBuf::from(DEV_ROOT),
        }
    }
}
