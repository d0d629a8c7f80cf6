//! Volume lifecycle controllers.
//!
//! [`VolumeManager`] sequences the individual controllers for the two
//! user-facing operations:
//!
//! - mount: attach, then mount; a failed mount is compensated by a detach
//! - unmount: unmount, remove the mountpoint, then detach

mod attach;
mod detach;
mod mount;
mod unmount;

use std::path::PathBuf;
use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use volmount_common::{VolmountPaths, VolmountResult, VolumeId};

pub use attach::AttachController;
pub use detach::DetachController;
pub use mount::{MountController, MountOutcome};
pub use unmount::{UnmountController, UnmountOutcome};

use crate::cloud::{Ec2Client, Instance, InstanceIdentity, MetadataClient, VolumeService};
use crate::config::Config;
use crate::device::DeviceAllocator;
use crate::host::{HostOps, LinuxHost};
use crate::retry::BestEffort;

/// Mounts and unmounts volumes on the current instance.
pub struct VolumeManager {
    instance: Instance,
    paths: VolmountPaths,
    attacher: AttachController,
    detacher: DetachController,
    mounter: MountController,
    unmounter: UnmountController,
}

impl VolumeManager {
    /// Build a manager from explicit collaborators.
    pub fn new(
        config: &Config,
        instance: Instance,
        volumes: Arc<dyn VolumeService>,
        host: Arc<dyn HostOps>,
    ) -> Self {
        let detacher = DetachController::new(Arc::clone(&volumes), instance.id.clone());
        let attacher = AttachController::new(
            volumes,
            instance.id.clone(),
            DeviceAllocator::new(config.paths.dev_root.clone()),
            config.attach,
        );
        let mounter = MountController::new(Arc::clone(&host));
        let unmounter = UnmountController::new(host, detacher.clone(), config.paths.clone());

        Self {
            instance,
            paths: config.paths.clone(),
            attacher,
            detacher,
            mounter,
            unmounter,
        }
    }

    /// Discover the instance through the metadata service and talk to the
    /// real block-storage API and host.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata service, credentials or endpoint
    /// configuration are unusable.
    pub async fn connect(config: &Config) -> VolmountResult<Self> {
        let metadata = MetadataClient::new(&config.metadata_endpoint)?;
        let instance = metadata.resolve().await?;

        // Credentials follow the SDK's default chain: environment, shared
        // profile, web identity, container and instance role.
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(instance.region.clone()));
        if let Some(endpoint) = &config.ec2_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        let ec2 = Ec2Client::from_conf(&sdk_config)?.with_waiter(config.detach_wait);

        Ok(Self::new(
            config,
            instance,
            Arc::new(ec2),
            Arc::new(LinuxHost::new()),
        ))
    }

    /// The instance volumes are attached to.
    #[must_use]
    pub const fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Where `volume` is mounted.
    #[must_use]
    pub fn mountpoint(&self, volume: &VolumeId) -> PathBuf {
        self.paths.mountpoint(volume)
    }

    /// Attach and mount `volume`, returning its mountpoint.
    ///
    /// `format` names the filesystem to create if the first mount fails.
    /// If mounting fails the volume is detached again before the mount
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns the attach error, or the mount error after the compensating
    /// detach.
    pub async fn mount(&self, volume: &VolumeId, format: Option<&str>) -> VolmountResult<PathBuf> {
        let mountpoint = self.mountpoint(volume);
        let device = self.attacher.attach(volume).await?;

        if let Err(err) = self.mounter.mount(&device, &mountpoint, format) {
            tracing::error!(
                volume = %volume,
                device = %device.display(),
                error = %err,
                "Mount failed, detaching volume"
            );
            let _ = BestEffort::run("compensating detach", self.detacher.detach(volume)).await;
            return Err(err);
        }

        tracing::info!(volume = %volume, mountpoint = %mountpoint.display(), "Volume mounted");
        Ok(mountpoint)
    }

    /// Unmount and detach `volume`.
    ///
    /// # Errors
    ///
    /// See [`UnmountController::unmount`].
    pub async fn unmount(&self, volume: &VolumeId) -> VolmountResult<UnmountOutcome> {
        self.unmounter.unmount(volume).await
    }
}
