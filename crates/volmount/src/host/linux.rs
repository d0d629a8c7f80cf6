//! Host operations backed by the real system.

use std::os::unix::fs::DirBuilderExt;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use volmount_common::{VolmountError, VolmountResult};

use super::HostOps;

/// Runs the system's mount utilities and syscalls.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxHost;

impl LinuxHost {
    /// Create a host handle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    format!("{}\n{}", output.status, text.trim())
}

impl HostOps for LinuxHost {
    fn create_dir(&self, path: &Path, mode: u32) -> VolmountResult<()> {
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(path)?;
        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> VolmountResult<()> {
        std::fs::remove_dir(path)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    #[allow(clippy::useless_conversion)]
    fn device_id(&self, path: &Path) -> VolmountResult<u64> {
        let stat = rustix::fs::stat(path).map_err(|e| VolmountError::Io(e.into()))?;
        Ok(stat.st_dev.into())
    }

    fn mount(&self, device: &Path, mountpoint: &Path) -> VolmountResult<()> {
        tracing::debug!(
            device = %device.display(),
            mountpoint = %mountpoint.display(),
            "Running mount"
        );

        let output = Command::new("mount").arg(device).arg(mountpoint).output()?;
        if !output.status.success() {
            return Err(VolmountError::MountFailed {
                device: device.to_path_buf(),
                mountpoint: mountpoint.to_path_buf(),
                message: combined_output(&output),
            });
        }
        Ok(())
    }

    fn format(&self, device: &Path, fstype: &str) -> VolmountResult<()> {
        tracing::debug!(device = %device.display(), fstype, "Running mkfs");

        let output = Command::new("mkfs")
            .arg("-t")
            .arg(fstype)
            .arg(device)
            .output()?;
        if !output.status.success() {
            return Err(VolmountError::FormatFailed {
                device: device.to_path_buf(),
                fstype: fstype.to_string(),
                message: combined_output(&output),
            });
        }
        Ok(())
    }

    fn unmount(&self, mountpoint: &Path) -> VolmountResult<()> {
        use rustix::mount::{UnmountFlags, unmount};

        tracing::debug!(mountpoint = %mountpoint.display(), "Unmounting filesystem");

        unmount(mountpoint, UnmountFlags::empty()).map_err(|e| VolmountError::Io(e.into()))?;
        Ok(())
    }

    fn has_open_handles(&self, path: &Path) -> VolmountResult<bool> {
        // lsof exits 0 only when it found open files.
        let status = Command::new("lsof")
            .arg(path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) => Ok(status.success()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("lsof not found, assuming {} is not in use", path.display());
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }
}
