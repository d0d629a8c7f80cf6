//! Volume and instance ID validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{VolmountError, VolmountResult};

/// Maximum length of the suffix after the resource prefix.
const MAX_SUFFIX_LENGTH: usize = 32;

fn valid_suffix(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix).is_some_and(|suffix| {
        !suffix.is_empty()
            && suffix.len() <= MAX_SUFFIX_LENGTH
            && suffix
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
    })
}

/// A validated block-storage volume ID.
///
/// Volume IDs must:
/// - Start with `vol-`
/// - Continue with 1-32 lowercase alphanumeric characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeId(String);

impl VolumeId {
    /// Resource prefix of every volume ID.
    pub const PREFIX: &'static str = "vol-";

    /// Create a new volume ID, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID format is invalid.
    pub fn new(id: impl Into<String>) -> VolmountResult<Self> {
        let id = id.into();
        if !valid_suffix(&id, Self::PREFIX) {
            return Err(VolmountError::InvalidVolumeId { id });
        }
        Ok(Self(id))
    }

    /// Get the volume ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VolumeId {
    type Err = VolmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for VolumeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated compute instance ID (`i-` followed by 1-32 lowercase alphanumerics).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Resource prefix of every instance ID.
    pub const PREFIX: &'static str = "i-";

    /// Create a new instance ID, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID format is invalid.
    pub fn new(id: impl Into<String>) -> VolmountResult<Self> {
        let id = id.into();
        if !valid_suffix(&id, Self::PREFIX) {
            return Err(VolmountError::InvalidInstanceId { id });
        }
        Ok(Self(id))
    }

    /// Get the instance ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = VolmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn valid_volume_ids() {
        assert!(VolumeId::new("vol-1").is_ok());
        assert!(VolumeId::new("vol-0123456789abcdef0").is_ok());
        assert!(VolumeId::new("vol-049df61146c4d7901").is_ok());
    }

    #[test]
    fn invalid_volume_ids() {
        assert!(VolumeId::new("").is_err());
        assert!(VolumeId::new("vol-").is_err());
        assert!(VolumeId::new("vol-ABC").is_err());
        assert!(VolumeId::new("i-0123").is_err());
        assert!(VolumeId::new("vol-../etc").is_err());
        assert!(VolumeId::new(format!("vol-{}", "a".repeat(33))).is_err());
    }

    #[test]
    fn instance_ids() {
        let id: InstanceId = "i-0abc123".parse().unwrap();
        assert_eq!(id.as_str(), "i-0abc123");
        assert_eq!(id.to_string(), "i-0abc123");
        assert!(InstanceId::new("vol-0abc").is_err());
        assert!(InstanceId::new("i-").is_err());
    }

    proptest! {
        #[test]
        fn volume_ids_never_contain_path_separators(s in "\\PC{0,40}") {
            if let Ok(id) = VolumeId::new(s) {
                prop_assert!(!id.as_str().contains('/'));
                prop_assert!(!id.as_str().contains(".."));
            }
        }
    }
}
