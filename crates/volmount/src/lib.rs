//! # volmount
//!
//! Attach a network block-storage volume to the current compute instance and
//! mount it, or unmount and detach it again.
//!
//! ## Features
//!
//! - **Idempotent**: an attached volume is not re-attached, a mounted
//!   mountpoint is not re-mounted
//! - **Device allocation**: free `/dev/sd[f-p]` slots, checked under both the
//!   `sd` and `xvd` spellings
//! - **Compensation**: a failed mount detaches the volume again
//! - **Safe unmount**: refuses while files are open under the mountpoint
//!
//! ## Usage
//!
//! ```no_run
//! use volmount::{Config, VolumeManager};
//! use volmount_common::VolumeId;
//!
//! # async fn example() -> volmount_common::VolmountResult<()> {
//! let manager = VolumeManager::connect(&Config::default()).await?;
//! let volume: VolumeId = "vol-0123456789abcdef0".parse()?;
//!
//! let mountpoint = manager.mount(&volume, Some("ext4")).await?;
//! println!("{}", mountpoint.display());
//!
//! manager.unmount(&volume).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cli;
pub mod cloud;
pub mod config;
pub mod controller;
pub mod device;
pub mod host;
pub mod retry;

pub use config::Config;
pub use controller::VolumeManager;
