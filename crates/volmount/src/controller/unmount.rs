//! Unmount a volume, remove its mountpoint and detach it.

use std::sync::Arc;

use volmount_common::{VolmountError, VolmountPaths, VolmountResult, VolumeId};

use super::DetachController;
use crate::host::{HostOps, is_mounted};

/// What [`UnmountController::unmount`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmountOutcome {
    /// Nothing was mounted; nothing was touched.
    NotMounted,
    /// Unmounted, mountpoint removed and volume detached.
    Unmounted,
}

/// Tears a mounted volume down.
#[derive(Clone)]
pub struct UnmountController {
    host: Arc<dyn HostOps>,
    detacher: DetachController,
    paths: VolmountPaths,
}

impl UnmountController {
    /// Create a controller over `host`.
    pub fn new(host: Arc<dyn HostOps>, detacher: DetachController, paths: VolmountPaths) -> Self {
        Self {
            host,
            detacher,
            paths,
        }
    }

    /// Unmount `volume` from its mountpoint and detach it.
    ///
    /// A mountpoint that is missing or has nothing mounted is left alone and
    /// the volume is not detached.
    ///
    /// # Errors
    ///
    /// - [`VolmountError::MountpointBusy`] if files are open under the mountpoint
    /// - [`VolmountError::NotADirectory`] if the mountpoint is not a directory
    /// - the unmount, removal or detach error otherwise
    pub async fn unmount(&self, volume: &VolumeId) -> VolmountResult<UnmountOutcome> {
        let mountpoint = self.paths.mountpoint(volume);
        tracing::info!(volume = %volume, mountpoint = %mountpoint.display(), "Unmounting volume");

        if !self.host.exists(&mountpoint) || !is_mounted(self.host.as_ref(), &mountpoint)? {
            tracing::info!(mountpoint = %mountpoint.display(), "Nothing mounted");
            return Ok(UnmountOutcome::NotMounted);
        }

        if self.host.has_open_handles(&mountpoint)? {
            return Err(VolmountError::MountpointBusy { mountpoint });
        }

        self.host.unmount(&mountpoint)?;
        tracing::info!(mountpoint = %mountpoint.display(), "Removing mountpoint");
        self.host.remove_dir(&mountpoint)?;

        self.detacher.detach(volume).await?;
        tracing::info!(volume = %volume, "Volume unmounted and detached");
        Ok(UnmountOutcome::Unmounted)
    }
}
