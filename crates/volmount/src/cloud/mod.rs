//! Cloud collaborators: instance identity and the block-storage API.
//!
//! Controllers only see the [`InstanceIdentity`] and [`VolumeService`]
//! traits. Transport retries and throttling belong to the SDK; attach and
//! detach policy lives in the controllers.

mod ec2;
mod metadata;

use std::fmt;

use async_trait::async_trait;
use volmount_common::{InstanceId, VolmountResult, VolumeId};

pub use ec2::{AVAILABLE_WAITER, Ec2Client};
pub use metadata::{DEFAULT_METADATA_ENDPOINT, MetadataClient};

/// The compute instance this process runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Instance ID.
    pub id: InstanceId,
    /// Region the instance lives in.
    pub region: String,
}

/// Attachment lifecycle as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    /// Attach requested, not yet complete.
    Attaching,
    /// Attached and usable.
    Attached,
    /// Detach requested, not yet complete.
    Detaching,
    /// No longer attached.
    Detached,
    /// Attachment is temporarily busy on the provider side.
    Busy,
}

impl AttachmentState {
    /// Parse the provider's state string.
    #[must_use]
    pub fn from_api(state: &str) -> Option<Self> {
        match state {
            "attaching" => Some(Self::Attaching),
            "attached" => Some(Self::Attached),
            "detaching" => Some(Self::Detaching),
            "detached" => Some(Self::Detached),
            "busy" => Some(Self::Busy),
            _ => None,
        }
    }
}

impl fmt::Display for AttachmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Attaching => "attaching",
            Self::Attached => "attached",
            Self::Detaching => "detaching",
            Self::Detached => "detached",
            Self::Busy => "busy",
        };
        write!(f, "{s}")
    }
}

/// Volume lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeState {
    /// Being created.
    Creating,
    /// Not attached to any instance.
    Available,
    /// Attached to an instance.
    InUse,
    /// Being deleted.
    Deleting,
    /// Deleted.
    Deleted,
    /// Provider-side failure.
    Error,
}

impl VolumeState {
    /// Parse the provider's status string.
    #[must_use]
    pub fn from_api(state: &str) -> Option<Self> {
        match state {
            "creating" => Some(Self::Creating),
            "available" => Some(Self::Available),
            "in-use" => Some(Self::InUse),
            "deleting" => Some(Self::Deleting),
            "deleted" => Some(Self::Deleted),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One attachment record of a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeAttachment {
    /// Instance holding the attachment.
    pub instance_id: String,
    /// Device name as reported by the provider, e.g. `/dev/sdf`.
    pub device: String,
    /// Attachment state.
    pub state: AttachmentState,
}

/// Result of describing a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeDescription {
    /// Volume ID.
    pub id: VolumeId,
    /// Volume state.
    pub state: VolumeState,
    /// Current attachments (at most one for non multi-attach volumes).
    pub attachments: Vec<VolumeAttachment>,
}

impl VolumeDescription {
    /// The single active attachment, if the volume has exactly one.
    #[must_use]
    pub fn attachment(&self) -> Option<&VolumeAttachment> {
        match self.attachments.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// Resolves the identity of the calling instance.
#[async_trait]
pub trait InstanceIdentity: Send + Sync {
    /// Resolve the instance ID and region.
    ///
    /// # Errors
    ///
    /// Returns [`volmount_common::VolmountError::MetadataUnavailable`] if the
    /// metadata provider is unreachable or returns malformed data.
    async fn resolve(&self) -> VolmountResult<Instance>;
}

/// The block-storage API, consumed one call at a time.
#[async_trait]
pub trait VolumeService: Send + Sync {
    /// Describe a volume and its attachments.
    async fn describe(&self, volume: &VolumeId) -> VolmountResult<VolumeDescription>;

    /// Request attaching `volume` to `instance` as `device`.
    async fn attach(
        &self,
        volume: &VolumeId,
        instance: &InstanceId,
        device: &str,
    ) -> VolmountResult<()>;

    /// Request detaching `volume` from `instance`.
    async fn detach(&self, volume: &VolumeId, instance: &InstanceId) -> VolmountResult<()>;

    /// Block until the provider reports the volume unattached.
    async fn wait_until_available(&self, volume: &VolumeId) -> VolmountResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_parsing() {
        assert_eq!(
            AttachmentState::from_api("attached"),
            Some(AttachmentState::Attached)
        );
        assert_eq!(AttachmentState::from_api("busy"), Some(AttachmentState::Busy));
        assert_eq!(AttachmentState::from_api("stuck"), None);
        assert_eq!(VolumeState::from_api("in-use"), Some(VolumeState::InUse));
        assert_eq!(VolumeState::from_api("optimizing"), None);
    }

    #[test]
    fn single_attachment_only() {
        let attachment = VolumeAttachment {
            instance_id: "i-1".to_string(),
            device: "/dev/sdf".to_string(),
            state: AttachmentState::Attached,
        };
        let mut description = VolumeDescription {
            id: VolumeId::new("vol-1").unwrap(),
            state: VolumeState::InUse,
            attachments: vec![attachment.clone()],
        };
        assert_eq!(description.attachment(), Some(&attachment));

        description.attachments.push(attachment);
        assert_eq!(description.attachment(), None);
    }
}
