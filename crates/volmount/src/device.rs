//! Device naming and slot allocation.
//!
//! The platform may surface one attachment as `/dev/sdX` or `/dev/xvdX`.
//! A slot letter denotes one physical attachment point regardless of the
//! spelling, so every lookup checks both namespaces.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use volmount_common::{VolmountError, VolmountResult};

/// First attachable slot letter.
pub const FIRST_SLOT: char = 'f';
/// Last attachable slot letter.
pub const LAST_SLOT: char = 'p';

/// Device naming namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceNamespace {
    /// `/dev/sdX`, the spelling used in attach requests.
    Legacy,
    /// `/dev/xvdX`, surfaced by paravirtualized kernels.
    Paravirtual,
}

impl DeviceNamespace {
    /// Both namespaces, legacy first.
    pub const ALL: [Self; 2] = [Self::Legacy, Self::Paravirtual];

    /// Node name prefix under the device root.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Legacy => "sd",
            Self::Paravirtual => "xvd",
        }
    }
}

/// One of the attachable device slots (`f` through `p`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceSlot(char);

impl DeviceSlot {
    /// Create a slot, validating the letter range.
    ///
    /// # Errors
    ///
    /// Returns [`VolmountError::InvalidDevice`] for letters outside `f..=p`.
    pub fn new(letter: char) -> VolmountResult<Self> {
        if (FIRST_SLOT..=LAST_SLOT).contains(&letter) {
            Ok(Self(letter))
        } else {
            Err(VolmountError::InvalidDevice {
                device: letter.to_string(),
            })
        }
    }

    /// Every attachable slot in allocation order.
    pub fn all() -> impl Iterator<Item = Self> {
        (FIRST_SLOT..=LAST_SLOT).map(Self)
    }

    /// The slot letter.
    #[must_use]
    pub const fn letter(self) -> char {
        self.0
    }

    /// Device name as the provider expects it in an attach request.
    #[must_use]
    pub fn request_name(self) -> String {
        DeviceName::new(DeviceNamespace::Legacy, self).to_string()
    }

    /// Local node path for this slot in `namespace`.
    #[must_use]
    pub fn local_path(self, dev_root: &Path, namespace: DeviceNamespace) -> PathBuf {
        dev_root.join(format!("{}{}", namespace.prefix(), self.0))
    }
}

impl fmt::Display for DeviceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully qualified device name such as `/dev/xvdg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceName {
    /// Namespace the name was spelled in.
    pub namespace: DeviceNamespace,
    /// The physical slot.
    pub slot: DeviceSlot,
}

impl DeviceName {
    /// Create a device name.
    #[must_use]
    pub const fn new(namespace: DeviceNamespace, slot: DeviceSlot) -> Self {
        Self { namespace, slot }
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/dev/{}{}", self.namespace.prefix(), self.slot)
    }
}

impl FromStr for DeviceName {
    type Err = VolmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VolmountError::InvalidDevice {
            device: s.to_string(),
        };

        let node = s.strip_prefix("/dev/").ok_or_else(invalid)?;
        let (namespace, rest) = DeviceNamespace::ALL
            .iter()
            .find_map(|ns| node.strip_prefix(ns.prefix()).map(|rest| (*ns, rest)))
            .ok_or_else(invalid)?;

        let mut chars = rest.chars();
        let (Some(letter), None) = (chars.next(), chars.next()) else {
            return Err(invalid());
        };
        let slot = DeviceSlot::new(letter).map_err(|_| invalid())?;

        Ok(Self::new(namespace, slot))
    }
}

/// Proposes free device slots and locates attached devices on this host.
#[derive(Debug, Clone)]
pub struct DeviceAllocator {
    dev_root: PathBuf,
}

impl DeviceAllocator {
    /// Create an allocator looking for device nodes under `dev_root`.
    pub fn new(dev_root: impl Into<PathBuf>) -> Self {
        Self {
            dev_root: dev_root.into(),
        }
    }

    /// Root directory of the device nodes.
    #[must_use]
    pub fn dev_root(&self) -> &Path {
        &self.dev_root
    }

    /// A slot is free when no node exists under either spelling.
    #[must_use]
    pub fn is_free(&self, slot: DeviceSlot) -> bool {
        DeviceNamespace::ALL
            .iter()
            .all(|ns| !node_exists(&slot.local_path(&self.dev_root, *ns)))
    }

    /// Next free slot after skipping `skip` free slots already tried.
    ///
    /// # Errors
    ///
    /// Returns [`VolmountError::DeviceExhaustion`] when fewer than `skip + 1`
    /// slots are free.
    pub fn next_free(&self, skip: u32) -> VolmountResult<DeviceSlot> {
        let slot = DeviceSlot::all()
            .filter(|slot| self.is_free(*slot))
            .nth(skip as usize)
            .ok_or(VolmountError::DeviceExhaustion)?;

        tracing::debug!(slot = %slot, skip, "Allocated device slot");
        Ok(slot)
    }

    /// Local node for an attached slot, trying the legacy spelling first.
    #[must_use]
    pub fn locate(&self, slot: DeviceSlot) -> Option<PathBuf> {
        DeviceNamespace::ALL
            .iter()
            .map(|ns| slot.local_path(&self.dev_root, *ns))
            .find(|path| node_exists(path))
    }
}

fn node_exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}
