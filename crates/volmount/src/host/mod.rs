//! Host operations: directories, mount utilities and device probes.
//!
//! The controllers decide *when* to run these; [`LinuxHost`] decides *how*.

mod linux;

use std::path::Path;

use volmount_common::{VolmountError, VolmountResult};

pub use linux::LinuxHost;

/// Permissions for freshly created mountpoints.
pub const MOUNTPOINT_MODE: u32 = 0o700;

/// Local filesystem and process collaborators.
pub trait HostOps: Send + Sync {
    /// Create `path` and any missing parents with `mode`.
    fn create_dir(&self, path: &Path, mode: u32) -> VolmountResult<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> VolmountResult<()>;

    /// Whether anything exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Identifier of the storage device holding `path`.
    fn device_id(&self, path: &Path) -> VolmountResult<u64>;

    /// Mount `device` at `mountpoint`.
    fn mount(&self, device: &Path, mountpoint: &Path) -> VolmountResult<()>;

    /// Create a `fstype` filesystem on `device`.
    fn format(&self, device: &Path, fstype: &str) -> VolmountResult<()>;

    /// Unmount whatever is mounted at `mountpoint`.
    fn unmount(&self, mountpoint: &Path) -> VolmountResult<()>;

    /// Whether any process holds files open under `path`.
    fn has_open_handles(&self, path: &Path) -> VolmountResult<bool>;
}

/// Whether something is mounted at `mountpoint`.
///
/// A mounted directory lives on a different device than its parent; the
/// directory merely existing says nothing.
///
/// # Errors
///
/// Returns [`VolmountError::NotADirectory`] if `mountpoint` is not a
/// directory, or the error of a failed device probe.
pub fn is_mounted(host: &dyn HostOps, mountpoint: &Path) -> VolmountResult<bool> {
    if !host.is_dir(mountpoint) {
        return Err(VolmountError::NotADirectory {
            path: mountpoint.to_path_buf(),
        });
    }

    let parent = mountpoint
        .parent()
        .map_or_else(|| mountpoint.join(".."), Path::to_path_buf);

    let mountpoint_dev = host.device_id(mountpoint)?;
    let parent_dev = host.device_id(&parent)?;
    Ok(mountpoint_dev != parent_dev)
}
