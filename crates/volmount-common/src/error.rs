//! Common error types for volmount.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`VolmountError`].
pub type VolmountResult<T> = Result<T, VolmountError>;

/// Errors raised while attaching, mounting, unmounting or detaching a volume.
#[derive(Error, Diagnostic, Debug)]
pub enum VolmountError {
    /// The instance metadata service could not be reached or returned garbage.
    #[error("Instance metadata unavailable: {message}")]
    #[diagnostic(
        code(volmount::metadata::unavailable),
        help("volmount must run on a compute instance with the metadata service enabled")
    )]
    MetadataUnavailable {
        /// What went wrong.
        message: String,
    },

    /// Invalid volume ID format.
    #[error("Invalid volume ID: {id}")]
    #[diagnostic(
        code(volmount::volume::invalid_id),
        help("Volume IDs look like 'vol-0123456789abcdef0'")
    )]
    InvalidVolumeId {
        /// The invalid volume ID.
        id: String,
    },

    /// Invalid instance ID format.
    #[error("Invalid instance ID: {id}")]
    #[diagnostic(code(volmount::instance::invalid_id))]
    InvalidInstanceId {
        /// The invalid instance ID.
        id: String,
    },

    /// A device string outside the attachable naming scheme.
    #[error("Invalid device name: {device}")]
    #[diagnostic(
        code(volmount::device::invalid),
        help("Attachable devices are /dev/sd[f-p] or /dev/xvd[f-p]")
    )]
    InvalidDevice {
        /// The device string that failed to parse.
        device: String,
    },

    /// Every attachable device slot is occupied.
    #[error("No device names available for attachment: /dev/sd[f-p] taken")]
    #[diagnostic(
        code(volmount::device::exhausted),
        help("Detach an unused volume from this instance to free a slot")
    )]
    DeviceExhaustion,

    /// The provider reports an attachment but no local device node exists.
    #[error("Volume {volume} attached as {device}, but no device found")]
    #[diagnostic(code(volmount::device::missing))]
    DeviceMissing {
        /// The volume ID.
        volume: String,
        /// The device name reported by the provider.
        device: String,
    },

    /// The volume is not attached to this instance.
    #[error("Volume {volume} is not attached")]
    #[diagnostic(code(volmount::volume::not_attached))]
    NotAttached {
        /// The volume ID.
        volume: String,
    },

    /// The attach loop ran out of attempts.
    #[error("Volume {volume} failed to attach after {attempts} attempts")]
    #[diagnostic(code(volmount::attach::timeout))]
    AttachTimeout {
        /// The volume ID.
        volume: String,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The volume is attached to a different instance.
    #[error("Volume {volume} is attached to another instance: {instance}")]
    #[diagnostic(
        code(volmount::attach::conflict),
        help("Detach the volume from {instance} first; volmount never steals volumes")
    )]
    VolumeConflict {
        /// The volume ID.
        volume: String,
        /// The instance currently holding the volume.
        instance: String,
    },

    /// Mounting failed, including the format fallback when requested.
    #[error("Mounting device {} to {} failed: {message}", .device.display(), .mountpoint.display())]
    #[diagnostic(code(volmount::mount::failed))]
    MountFailed {
        /// The local device path.
        device: PathBuf,
        /// The target mountpoint.
        mountpoint: PathBuf,
        /// Output of the failed mount.
        message: String,
    },

    /// Creating a filesystem on the device failed.
    #[error("Formatting device {} as {fstype} failed: {message}", .device.display())]
    #[diagnostic(code(volmount::mount::format_failed))]
    FormatFailed {
        /// The local device path.
        device: PathBuf,
        /// Requested filesystem type.
        fstype: String,
        /// Output of the failed format.
        message: String,
    },

    /// The mountpoint exists but is not a directory.
    #[error("Mountpoint {} is not a directory", .path.display())]
    #[diagnostic(code(volmount::mount::not_a_directory))]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// Open handles prevent unmounting.
    #[error("Mountpoint {} is in use", .mountpoint.display())]
    #[diagnostic(
        code(volmount::unmount::busy),
        help("Close files under the mountpoint (see `lsof`) and retry")
    )]
    MountpointBusy {
        /// The busy mountpoint.
        mountpoint: PathBuf,
    },

    /// Detaching the volume failed.
    #[error("Detaching volume {volume} failed: {message}")]
    #[diagnostic(code(volmount::detach::failed))]
    DetachFailed {
        /// The volume ID.
        volume: String,
        /// Underlying cause.
        message: String,
    },

    /// The block-storage API rejected a request.
    #[error("{action} failed: {code}: {message}")]
    #[diagnostic(code(volmount::api))]
    Api {
        /// API action name.
        action: String,
        /// Provider error code.
        code: String,
        /// Provider error message.
        message: String,
    },

    /// Transport failure talking to a remote service.
    #[error("Network error: {message}")]
    #[diagnostic(code(volmount::network))]
    Network {
        /// The error message.
        message: String,
    },

    /// No usable credentials.
    #[error("Credentials error: {message}")]
    #[diagnostic(
        code(volmount::credentials),
        help("Set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY or attach an instance role")
    )]
    Credentials {
        /// The error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(volmount::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(volmount::serialization))]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(volmount::config))]
    Config {
        /// The error message.
        message: String,
    },
}

impl From<serde_json::Error> for VolmountError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
