//! # volmount-common
//!
//! Shared types for the volmount crates:
//! - The error taxonomy used by every controller
//! - Validated volume and instance identifiers
//! - The deterministic mountpoint path convention

#![warn(missing_docs)]

pub mod error;
pub mod id;
pub mod paths;

pub use error::{VolmountError, VolmountResult};
pub use id::{InstanceId, VolumeId};
pub use paths::VolmountPaths;
