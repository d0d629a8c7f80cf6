//! Detach a volume and wait until the provider reports it free.

use std::sync::Arc;

use volmount_common::{InstanceId, VolmountError, VolmountResult, VolumeId};

use crate::cloud::VolumeService;

/// Requests detachment and blocks until the volume is available.
#[derive(Clone)]
pub struct DetachController {
    volumes: Arc<dyn VolumeService>,
    instance: InstanceId,
}

impl DetachController {
    /// Create a controller detaching volumes from `instance`.
    pub fn new(volumes: Arc<dyn VolumeService>, instance: InstanceId) -> Self {
        Self { volumes, instance }
    }

    /// Detach `volume`. Single attempt; failures are surfaced as
    /// [`VolmountError::DetachFailed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the detach request or the wait fails.
    pub async fn detach(&self, volume: &VolumeId) -> VolmountResult<()> {
        tracing::info!(volume = %volume, "Detaching volume");

        self.volumes
            .detach(volume, &self.instance)
            .await
            .map_err(|e| detach_failed(volume, e))?;

        tracing::info!(volume = %volume, "Waiting for volume detachment");
        self.volumes
            .wait_until_available(volume)
            .await
            .map_err(|e| detach_failed(volume, e))?;

        tracing::info!(volume = %volume, "Volume detached");
        Ok(())
    }
}

fn detach_failed(volume: &VolumeId, err: VolmountError) -> VolmountError {
    match err {
        err @ VolmountError::DetachFailed { .. } => err,
        other => VolmountError::DetachFailed {
            volume: volume.to_string(),
            message: other.to_string(),
        },
    }
}
