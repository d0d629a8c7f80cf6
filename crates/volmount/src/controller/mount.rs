//! Mount an attached device, optionally formatting it first.

use std::path::Path;
use std::sync::Arc;

use volmount_common::VolmountResult;

use crate::host::{HostOps, MOUNTPOINT_MODE, is_mounted};

/// What [`MountController::mount`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    /// The device was mounted by this call.
    Mounted,
    /// Something was already mounted at the mountpoint.
    AlreadyMounted,
}

/// Puts a device on a mountpoint.
#[derive(Clone)]
pub struct MountController {
    host: Arc<dyn HostOps>,
}

impl MountController {
    /// Create a controller over `host`.
    pub fn new(host: Arc<dyn HostOps>) -> Self {
        Self { host }
    }

    /// Mount `device` at `mountpoint`.
    ///
    /// With `format`, a failed mount is followed by creating a filesystem of
    /// that type and a single retry. Without it the device is never
    /// formatted.
    ///
    /// # Errors
    ///
    /// Returns the error of the last mount attempt, or of creating or probing
    /// the mountpoint.
    pub fn mount(
        &self,
        device: &Path,
        mountpoint: &Path,
        format: Option<&str>,
    ) -> VolmountResult<MountOutcome> {
        tracing::info!(
            device = %device.display(),
            mountpoint = %mountpoint.display(),
            "Mounting device"
        );

        self.host.create_dir(mountpoint, MOUNTPOINT_MODE)?;
        if is_mounted(self.host.as_ref(), mountpoint)? {
            tracing::info!(mountpoint = %mountpoint.display(), "Already mounted");
            return Ok(MountOutcome::AlreadyMounted);
        }

        let Err(err) = self.host.mount(device, mountpoint) else {
            return Ok(MountOutcome::Mounted);
        };
        let Some(fstype) = format else {
            return Err(err);
        };

        tracing::warn!(
            device = %device.display(),
            fstype,
            error = %err,
            "Mount failed, formatting device"
        );
        if let Err(format_err) = self.host.format(device, fstype) {
            // The retry below reports the outcome that matters.
            tracing::warn!(device = %device.display(), error = %format_err, "Format failed");
        }

        self.host.mount(device, mountpoint)?;
        Ok(MountOutcome::Mounted)
    }
}
