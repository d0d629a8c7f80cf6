//! Volume operations over the EC2 SDK client.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::operation::describe_volumes::DescribeVolumesOutput;
use volmount_common::{InstanceId, VolmountError, VolmountResult, VolumeId};

use super::{
    AttachmentState, VolumeAttachment, VolumeDescription, VolumeService, VolumeState,
};
use crate::retry::RetryPolicy;

/// The provider's standard "volume available" waiter: 40 polls, 15 s apart.
pub const AVAILABLE_WAITER: RetryPolicy = RetryPolicy::fixed(40, Duration::from_secs(15));

/// Map an SDK failure: service errors carry a code, everything else is
/// transport.
fn api_error<E, R>(action: &str, err: &SdkError<E, R>) -> VolmountError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some(code) => VolmountError::Api {
            action: action.to_string(),
            code: code.to_string(),
            message: err.message().unwrap_or_default().to_string(),
        },
        None => VolmountError::Network {
            message: format!("{action}: {}", DisplayErrorContext(err)),
        },
    }
}

/// Volume operations against EC2.
#[derive(Debug, Clone)]
pub struct Ec2Client {
    client: Client,
    waiter: RetryPolicy,
}

impl Ec2Client {
    /// Wrap an existing SDK client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self {
            client,
            waiter: AVAILABLE_WAITER,
        }
    }

    /// Build a client from loaded SDK configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VolmountError::Credentials`] if the configuration carries
    /// no credentials provider.
    pub fn from_conf(config: &SdkConfig) -> VolmountResult<Self> {
        if config.credentials_provider().is_none() {
            return Err(VolmountError::Credentials {
                message: "no credentials provider configured".to_string(),
            });
        }
        Ok(Self::new(Client::new(config)))
    }

    /// Poll policy for [`VolumeService::wait_until_available`].
    #[must_use]
    pub const fn with_waiter(mut self, waiter: RetryPolicy) -> Self {
        self.waiter = waiter;
        self
    }
}

#[async_trait]
impl VolumeService for Ec2Client {
    async fn describe(&self, volume: &VolumeId) -> VolmountResult<VolumeDescription> {
        tracing::debug!(volume = %volume, "DescribeVolumes");
        let output = self
            .client
            .describe_volumes()
            .volume_ids(volume.as_str())
            .send()
            .await
            .map_err(|e| api_error("DescribeVolumes", &e))?;
        describe_output(volume, &output)
    }

    async fn attach(
        &self,
        volume: &VolumeId,
        instance: &InstanceId,
        device: &str,
    ) -> VolmountResult<()> {
        tracing::debug!(volume = %volume, instance = %instance, device, "AttachVolume");
        self.client
            .attach_volume()
            .volume_id(volume.as_str())
            .instance_id(instance.as_str())
            .device(device)
            .send()
            .await
            .map_err(|e| api_error("AttachVolume", &e))?;
        Ok(())
    }

    async fn detach(&self, volume: &VolumeId, instance: &InstanceId) -> VolmountResult<()> {
        tracing::debug!(volume = %volume, instance = %instance, "DetachVolume");
        self.client
            .detach_volume()
            .volume_id(volume.as_str())
            .instance_id(instance.as_str())
            .send()
            .await
            .map_err(|e| api_error("DetachVolume", &e))?;
        Ok(())
    }

    async fn wait_until_available(&self, volume: &VolumeId) -> VolmountResult<()> {
        let attempts = self.waiter.attempts();
        for attempt in 0..attempts {
            let description = self.describe(volume).await?;
            if is_available(&description)? {
                return Ok(());
            }
            tracing::debug!(volume = %volume, state = ?description.state, attempt, "Volume not yet available");

            if attempt + 1 < attempts {
                self.waiter.pause(attempt).await;
            }
        }

        Err(VolmountError::DetachFailed {
            volume: volume.to_string(),
            message: format!("volume not available after {attempts} polls"),
        })
    }
}

/// Whether the waiter is done. `deleted` and `error` end the wait with a
/// failure.
fn is_available(description: &VolumeDescription) -> VolmountResult<bool> {
    match description.state {
        VolumeState::Available => Ok(true),
        VolumeState::Deleted | VolumeState::Error => Err(VolmountError::DetachFailed {
            volume: description.id.to_string(),
            message: format!("volume entered state {:?}", description.state),
        }),
        _ => Ok(false),
    }
}

fn describe_output(
    volume: &VolumeId,
    output: &DescribeVolumesOutput,
) -> VolmountResult<VolumeDescription> {
    let item = output
        .volumes()
        .iter()
        .find(|v| v.volume_id() == Some(volume.as_str()))
        .ok_or_else(|| VolmountError::Api {
            action: "DescribeVolumes".to_string(),
            code: "InvalidVolume.NotFound".to_string(),
            message: format!("The volume '{volume}' does not exist."),
        })?;

    let status = item.state().map_or("", |s| s.as_str());
    let state = VolumeState::from_api(status).ok_or_else(|| {
        VolmountError::Serialization(format!("unknown volume state '{status}'"))
    })?;

    let attachments = item
        .attachments()
        .iter()
        .filter_map(|a| {
            let status = a.state().map_or("", |s| s.as_str());
            let Some(state) = AttachmentState::from_api(status) else {
                tracing::warn!(volume = %volume, status, "Ignoring attachment in unknown state");
                return None;
            };
            Some(VolumeAttachment {
                instance_id: a.instance_id().unwrap_or_default().to_string(),
                device: a.device().unwrap_or_default().to_string(),
                state,
            })
        })
        .collect();

    Ok(VolumeDescription {
        id: volume.clone(),
        state,
        attachments,
    })
}
