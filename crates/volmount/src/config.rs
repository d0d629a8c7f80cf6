//! Runtime configuration.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use volmount_common::VolmountPaths;

use crate::cloud::{AVAILABLE_WAITER, DEFAULT_METADATA_ENDPOINT};
use crate::retry::{AttachPolicy, RetryPolicy};

/// Metadata endpoint, overridable through `VOLMOUNT_METADATA_ENDPOINT`.
static METADATA_ENDPOINT: Lazy<String> = Lazy::new(|| {
    std::env::var("VOLMOUNT_METADATA_ENDPOINT")
        .unwrap_or_else(|_| DEFAULT_METADATA_ENDPOINT.to_string())
});

/// Block-storage API endpoint override (`VOLMOUNT_EC2_ENDPOINT`).
static EC2_ENDPOINT: Lazy<Option<String>> =
    Lazy::new(|| std::env::var("VOLMOUNT_EC2_ENDPOINT").ok());

/// Configuration for a [`VolumeManager`](crate::VolumeManager).
#[derive(Debug, Clone)]
pub struct Config {
    /// Mount and device roots.
    pub paths: VolmountPaths,
    /// Attach attempts and polling.
    pub attach: AttachPolicy,
    /// How long to wait for a detached volume to become available.
    pub detach_wait: RetryPolicy,
    /// Instance metadata service base URL.
    pub metadata_endpoint: String,
    /// Block-storage API endpoint; the regional default when unset.
    pub ec2_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: VolmountPaths::new(),
            attach: AttachPolicy::default(),
            detach_wait: AVAILABLE_WAITER,
            metadata_endpoint: METADATA_ENDPOINT.clone(),
            ec2_endpoint: EC2_ENDPOINT.clone(),
        }
    }
}

impl Config {
    /// Set the directory mountpoints are created under.
    #[must_use]
    pub fn with_mount_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.paths.mount_root = root.into();
        self
    }

    /// Set the directory device nodes appear in.
    #[must_use]
    pub fn with_dev_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.paths.dev_root = root.into();
        self
    }

    /// Set the attach policy.
    #[must_use]
    pub const fn with_attach_policy(mut self, policy: AttachPolicy) -> Self {
        self.attach = policy;
        self
    }

    /// Set the detach wait policy.
    #[must_use]
    pub const fn with_detach_wait(mut self, policy: RetryPolicy) -> Self {
        self.detach_wait = policy;
        self
    }

    /// Set the metadata service endpoint.
    #[must_use]
    pub fn with_metadata_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.metadata_endpoint = endpoint.into();
        self
    }

    /// Set the block-storage API endpoint.
    #[must_use]
    pub fn with_ec2_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.ec2_endpoint = Some(endpoint.into());
        self
    }
}
