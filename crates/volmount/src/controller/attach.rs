//! Attach state machine.
//!
//! `checking` → (`attaching` → `polling`)* → `attached` | `failed`.
//! Each attach attempt uses a fresh device slot so a name collision on one
//! slot moves on to the next instead of repeating.

use std::path::PathBuf;
use std::sync::Arc;

use volmount_common::{InstanceId, VolmountError, VolmountResult, VolumeId};

use super::DetachController;
use crate::cloud::{AttachmentState, VolumeService};
use crate::device::{DeviceAllocator, DeviceName};
use crate::retry::{AttachPolicy, BestEffort};

/// Where a volume currently stands relative to this instance.
#[derive(Debug)]
enum Observed {
    /// Attached here and the local device node exists.
    Ready(PathBuf),
    /// Attached or attaching here, but not usable yet.
    Pending(VolmountError),
    /// Held by another instance.
    Elsewhere(String),
    /// No attachment.
    Absent,
}

/// Drives a volume to "attached to this instance".
#[derive(Clone)]
pub struct AttachController {
    volumes: Arc<dyn VolumeService>,
    instance: InstanceId,
    allocator: DeviceAllocator,
    detacher: DetachController,
    policy: AttachPolicy,
}

impl AttachController {
    /// Create a controller attaching volumes to `instance`.
    pub fn new(
        volumes: Arc<dyn VolumeService>,
        instance: InstanceId,
        allocator: DeviceAllocator,
        policy: AttachPolicy,
    ) -> Self {
        let detacher = DetachController::new(Arc::clone(&volumes), instance.clone());
        Self {
            volumes,
            instance,
            allocator,
            detacher,
            policy,
        }
    }

    /// Attach `volume` and return its local device path.
    ///
    /// Returns immediately, without an attach request, when the volume is
    /// already attached here.
    ///
    /// # Errors
    ///
    /// - [`VolmountError::VolumeConflict`] if another instance holds the volume
    /// - [`VolmountError::DeviceExhaustion`] if no device slot is free
    /// - [`VolmountError::AttachTimeout`] once every attempt failed
    pub async fn attach(&self, volume: &VolumeId) -> VolmountResult<PathBuf> {
        tracing::info!(volume = %volume, "Attaching volume");

        match self.observe(volume).await? {
            Observed::Ready(device) => {
                tracing::info!(volume = %volume, device = %device.display(), "Volume already attached");
                return Ok(device);
            }
            Observed::Elsewhere(instance) => {
                return Err(VolmountError::VolumeConflict {
                    volume: volume.to_string(),
                    instance,
                });
            }
            Observed::Pending(reason) => {
                tracing::info!(volume = %volume, reason = %reason, "Attachment not usable, re-attaching");
            }
            Observed::Absent => {}
        }

        for attempt in 0..self.policy.max_attempts {
            let slot = self.allocator.next_free(attempt)?;
            let device = slot.request_name();
            tracing::info!(volume = %volume, device = %device, attempt, "Using device");

            // Clears a stale mapping; failing here (e.g. never attached) is expected.
            let _ = BestEffort::run("detach before attach", self.detacher.detach(volume)).await;

            if let Err(err) = self.volumes.attach(volume, &self.instance, &device).await {
                tracing::warn!(volume = %volume, device = %device, attempt, error = %err, "Attach request failed");
                continue;
            }

            tracing::info!(volume = %volume, device = %device, "Waiting for volume to attach");
            match self.poll(volume).await {
                Ok(local) => {
                    tracing::info!(volume = %volume, device = %local.display(), "Volume attached");
                    return Ok(local);
                }
                Err(err) => {
                    tracing::warn!(volume = %volume, device = %device, attempt, error = %err, "Volume did not attach");
                }
            }
        }

        Err(VolmountError::AttachTimeout {
            volume: volume.to_string(),
            attempts: self.policy.max_attempts,
        })
    }

    /// Poll until the attachment is usable or the poll policy runs out.
    async fn poll(&self, volume: &VolumeId) -> VolmountResult<PathBuf> {
        let polls = self.policy.poll.attempts();
        let mut last = VolmountError::NotAttached {
            volume: volume.to_string(),
        };

        for poll in 0..polls {
            match self.observe(volume).await {
                Ok(Observed::Ready(device)) => return Ok(device),
                Ok(Observed::Pending(reason)) => last = reason,
                Ok(Observed::Elsewhere(instance)) => {
                    last = VolmountError::VolumeConflict {
                        volume: volume.to_string(),
                        instance,
                    };
                }
                Ok(Observed::Absent) => {
                    last = VolmountError::NotAttached {
                        volume: volume.to_string(),
                    };
                }
                Err(err) => last = err,
            }
            tracing::debug!(volume = %volume, poll, reason = %last, "Attachment not ready");

            if poll + 1 < polls {
                self.policy.poll.pause(poll).await;
            }
        }

        Err(last)
    }

    async fn observe(&self, volume: &VolumeId) -> VolmountResult<Observed> {
        let description = self.volumes.describe(volume).await?;
        let Some(attachment) = description
            .attachments
            .iter()
            .find(|a| a.state != AttachmentState::Detached)
        else {
            return Ok(Observed::Absent);
        };

        if attachment.instance_id != self.instance.as_str() {
            // A detaching attachment frees itself; the attach loop waits it out.
            if attachment.state == AttachmentState::Detaching {
                return Ok(Observed::Absent);
            }
            return Ok(Observed::Elsewhere(attachment.instance_id.clone()));
        }
        if attachment.state != AttachmentState::Attached {
            return Ok(Observed::Pending(VolmountError::NotAttached {
                volume: volume.to_string(),
            }));
        }

        let name: DeviceName = match attachment.device.parse() {
            Ok(name) => name,
            Err(err) => return Ok(Observed::Pending(err)),
        };
        Ok(self.allocator.locate(name.slot).map_or_else(
            || {
                Observed::Pending(VolmountError::DeviceMissing {
                    volume: volume.to_string(),
                    device: attachment.device.clone(),
                })
            },
            Observed::Ready,
        ))
    }
}
