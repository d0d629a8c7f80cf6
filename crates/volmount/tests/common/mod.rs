//! In-memory collaborators for driving the controllers.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use volmount::cloud::{
    AttachmentState, Instance, VolumeAttachment, VolumeDescription, VolumeService, VolumeState,
};
use volmount::host::HostOps;
use volmount::retry::{AttachPolicy, RetryPolicy};
use volmount::{Config, VolumeManager};
use volmount_common::{InstanceId, VolmountError, VolmountResult, VolumeId};

pub const INSTANCE: &str = "i-0abc123";
pub const VOLUME: &str = "vol-0def456";

/// Calls made against [`FakeVolumes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeCall {
    Describe,
    Attach(String),
    Detach,
    WaitAvailable,
}

#[derive(Default)]
struct VolumesState {
    attachment: Option<VolumeAttachment>,
    calls: Vec<VolumeCall>,
    rejected: HashSet<String>,
    never_attach: bool,
    attach_after: Option<usize>,
    polls_left: usize,
    fail_detach: bool,
}

/// Block-storage provider that surfaces attached devices as `xvd*` nodes
/// under a temporary device root.
pub struct FakeVolumes {
    dev_root: PathBuf,
    state: Mutex<VolumesState>,
}

impl FakeVolumes {
    pub fn new(dev_root: &Path) -> Self {
        Self {
            dev_root: dev_root.to_path_buf(),
            state: Mutex::new(VolumesState::default()),
        }
    }

    /// Pretend the volume is already attached.
    pub fn attached(self, instance: &str, device: &str, state: AttachmentState) -> Self {
        self.state.lock().attachment = Some(VolumeAttachment {
            instance_id: instance.to_string(),
            device: device.to_string(),
            state,
        });
        self
    }

    /// Fail attach requests naming `device`.
    pub fn reject(self, device: &str) -> Self {
        self.state.lock().rejected.insert(device.to_string());
        self
    }

    /// Accept attach requests but never finish attaching.
    pub fn never_attach(self) -> Self {
        self.state.lock().never_attach = true;
        self
    }

    /// Report `attaching` for `polls` describe calls after each attach
    /// request, then `attached`.
    pub fn attach_after_polls(self, polls: usize) -> Self {
        self.state.lock().attach_after = Some(polls);
        self
    }

    /// Fail every detach request.
    pub fn fail_detach(self) -> Self {
        self.state.lock().fail_detach = true;
        self
    }

    pub fn calls(&self) -> Vec<VolumeCall> {
        self.state.lock().calls.clone()
    }

    pub fn attach_requests(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VolumeCall::Attach(device) => Some(device),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &VolumeCall) -> usize {
        self.calls().iter().filter(|call| *call == wanted).count()
    }

    pub fn attachment(&self) -> Option<VolumeAttachment> {
        self.state.lock().attachment.clone()
    }

    fn node_for(&self, device: &str) -> Option<PathBuf> {
        let letter = device.chars().last()?;
        Some(self.dev_root.join(format!("xvd{letter}")))
    }
}

#[async_trait]
impl VolumeService for FakeVolumes {
    async fn describe(&self, volume: &VolumeId) -> VolmountResult<VolumeDescription> {
        let mut state = self.state.lock();
        state.calls.push(VolumeCall::Describe);

        let pending = state
            .attachment
            .as_ref()
            .is_some_and(|a| a.state == AttachmentState::Attaching);
        if pending && state.attach_after.is_some() {
            if state.polls_left == 0 {
                if let Some(attachment) = state.attachment.as_mut() {
                    attachment.state = AttachmentState::Attached;
                    if let Some(node) = self.node_for(&attachment.device) {
                        std::fs::write(node, b"")?;
                    }
                }
            } else {
                state.polls_left -= 1;
            }
        }

        let attachments: Vec<_> = state.attachment.iter().cloned().collect();
        Ok(VolumeDescription {
            id: volume.clone(),
            state: if attachments.is_empty() {
                VolumeState::Available
            } else {
                VolumeState::InUse
            },
            attachments,
        })
    }

    async fn attach(
        &self,
        volume: &VolumeId,
        instance: &InstanceId,
        device: &str,
    ) -> VolmountResult<()> {
        let mut state = self.state.lock();
        state.calls.push(VolumeCall::Attach(device.to_string()));

        let occupied = state
            .attachment
            .as_ref()
            .is_some_and(|a| a.state != AttachmentState::Detaching);
        if state.rejected.contains(device) || occupied {
            return Err(VolmountError::Api {
                action: "AttachVolume".to_string(),
                code: "InvalidParameterValue".to_string(),
                message: format!("{device} is already in use for {volume}"),
            });
        }

        let attached = if state.never_attach {
            AttachmentState::Attaching
        } else if let Some(polls) = state.attach_after {
            state.polls_left = polls;
            AttachmentState::Attaching
        } else {
            if let Some(node) = self.node_for(device) {
                std::fs::write(node, b"")?;
            }
            AttachmentState::Attached
        };
        state.attachment = Some(VolumeAttachment {
            instance_id: instance.to_string(),
            device: device.to_string(),
            state: attached,
        });
        Ok(())
    }

    async fn detach(&self, volume: &VolumeId, instance: &InstanceId) -> VolmountResult<()> {
        let mut state = self.state.lock();
        state.calls.push(VolumeCall::Detach);

        let attached_here = state
            .attachment
            .as_ref()
            .is_some_and(|a| a.instance_id == instance.as_str());
        if state.fail_detach || !attached_here {
            return Err(VolmountError::Api {
                action: "DetachVolume".to_string(),
                code: "IncorrectState".to_string(),
                message: format!("Volume '{volume}' is in the 'available' state."),
            });
        }

        if let Some(attachment) = state.attachment.take() {
            if let Some(node) = self.node_for(&attachment.device) {
                let _ = std::fs::remove_file(node);
            }
        }
        Ok(())
    }

    async fn wait_until_available(&self, _volume: &VolumeId) -> VolmountResult<()> {
        self.state.lock().calls.push(VolumeCall::WaitAvailable);
        Ok(())
    }
}

/// Calls made against [`FakeHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    CreateDir(PathBuf),
    Mount(PathBuf, PathBuf),
    Format(PathBuf, String),
    Unmount(PathBuf),
    RemoveDir(PathBuf),
}

#[derive(Default)]
struct HostState {
    dirs: HashSet<PathBuf>,
    files: HashSet<PathBuf>,
    mounted: HashSet<PathBuf>,
    calls: Vec<HostCall>,
    mount_failures: usize,
    fail_format: bool,
    busy: bool,
}

/// Host with an in-memory directory tree and mount table.
#[derive(Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` mount attempts.
    pub fn failing_mounts(self, count: usize) -> Self {
        self.state.lock().mount_failures = count;
        self
    }

    pub fn failing_format(self) -> Self {
        self.state.lock().fail_format = true;
        self
    }

    /// Report open files under every path.
    pub fn busy(self) -> Self {
        self.state.lock().busy = true;
        self
    }

    /// Pretend `path` is a mounted directory.
    pub fn mounted(self, path: &Path) -> Self {
        {
            let mut state = self.state.lock();
            state.dirs.insert(path.to_path_buf());
            state.mounted.insert(path.to_path_buf());
        }
        self
    }

    /// Create an empty directory at `path`.
    pub fn dir(self, path: &Path) -> Self {
        self.state.lock().dirs.insert(path.to_path_buf());
        self
    }

    /// Put a regular file at `path`.
    pub fn file(self, path: &Path) -> Self {
        self.state.lock().files.insert(path.to_path_buf());
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().calls.clone()
    }

    pub fn is_mounted(&self, path: &Path) -> bool {
        self.state.lock().mounted.contains(path)
    }

    pub fn has_dir(&self, path: &Path) -> bool {
        self.state.lock().dirs.contains(path)
    }

    pub fn mount_attempts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, HostCall::Mount(..)))
            .count()
    }

    pub fn format_attempts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, HostCall::Format(..)))
            .count()
    }
}

impl HostOps for FakeHost {
    fn create_dir(&self, path: &Path, _mode: u32) -> VolmountResult<()> {
        let mut state = self.state.lock();
        state.calls.push(HostCall::CreateDir(path.to_path_buf()));
        if state.files.contains(path) {
            return Err(std::io::Error::from(std::io::ErrorKind::AlreadyExists).into());
        }
        for ancestor in path.ancestors() {
            state.dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> VolmountResult<()> {
        let mut state = self.state.lock();
        state.calls.push(HostCall::RemoveDir(path.to_path_buf()));
        if !state.dirs.remove(path) {
            return Err(std::io::Error::from(std::io::ErrorKind::NotFound).into());
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.lock();
        state.dirs.contains(path) || state.files.contains(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.state.lock().dirs.contains(path)
    }

    fn device_id(&self, path: &Path) -> VolmountResult<u64> {
        Ok(if self.state.lock().mounted.contains(path) {
            2
        } else {
            1
        })
    }

    fn mount(&self, device: &Path, mountpoint: &Path) -> VolmountResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(HostCall::Mount(device.to_path_buf(), mountpoint.to_path_buf()));
        if state.mount_failures > 0 {
            state.mount_failures -= 1;
            return Err(VolmountError::MountFailed {
                device: device.to_path_buf(),
                mountpoint: mountpoint.to_path_buf(),
                message: "wrong fs type, bad option, bad superblock".to_string(),
            });
        }
        state.mounted.insert(mountpoint.to_path_buf());
        Ok(())
    }

    fn format(&self, device: &Path, fstype: &str) -> VolmountResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(HostCall::Format(device.to_path_buf(), fstype.to_string()));
        if state.fail_format {
            return Err(VolmountError::FormatFailed {
                device: device.to_path_buf(),
                fstype: fstype.to_string(),
                message: "mkfs: device is busy".to_string(),
            });
        }
        Ok(())
    }

    fn unmount(&self, mountpoint: &Path) -> VolmountResult<()> {
        let mut state = self.state.lock();
        state.calls.push(HostCall::Unmount(mountpoint.to_path_buf()));
        state.mounted.remove(mountpoint);
        Ok(())
    }

    fn has_open_handles(&self, _path: &Path) -> VolmountResult<bool> {
        Ok(self.state.lock().busy)
    }
}

/// Temporary mount and device roots.
pub struct Sandbox {
    pub root: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("dev")).unwrap();
        Self { root }
    }

    pub fn dev_root(&self) -> PathBuf {
        self.root.path().join("dev")
    }

    pub fn mount_root(&self) -> PathBuf {
        self.root.path().join("mnt")
    }

    pub fn mountpoint(&self) -> PathBuf {
        self.mount_root().join(VOLUME)
    }

    /// Create device nodes, e.g. `["sdf", "xvdg"]`.
    pub fn occupy(&self, names: &[&str]) {
        for name in names {
            std::fs::write(self.dev_root().join(name), b"").unwrap();
        }
    }

    pub fn config(&self) -> Config {
        Config::default()
            .with_mount_root(self.mount_root())
            .with_dev_root(self.dev_root())
            .with_attach_policy(AttachPolicy::immediate(25, 3))
            .with_detach_wait(RetryPolicy::immediate(1))
    }

    pub fn fakes(&self) -> FakeVolumes {
        FakeVolumes::new(&self.dev_root())
    }
}

pub fn volume() -> VolumeId {
    VolumeId::new(VOLUME).unwrap()
}

pub fn instance() -> Instance {
    Instance {
        id: InstanceId::new(INSTANCE).unwrap(),
        region: "us-east-1".to_string(),
    }
}

pub fn manager(config: &Config, volumes: &Arc<FakeVolumes>, host: &Arc<FakeHost>) -> VolumeManager {
    VolumeManager::new(
        config,
        instance(),
        Arc::clone(volumes) as Arc<dyn VolumeService>,
        Arc::clone(host) as Arc<dyn HostOps>,
    )
}
