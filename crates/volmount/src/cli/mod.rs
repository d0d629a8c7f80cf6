//! CLI definition and handler.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use volmount_common::{VolmountResult, VolumeId};

use crate::config::Config;
use crate::controller::{UnmountOutcome, VolumeManager};

/// volmount - attach and mount block-storage volumes
#[derive(Parser, Debug)]
#[command(name = "volmount")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Volume ID, e.g. vol-0123456789abcdef0
    #[arg(value_name = "VOLUME_ID")]
    pub volume: Option<VolumeId>,

    /// Unmount and detach instead of attach and mount
    #[arg(short, long)]
    pub unmount: bool,

    /// Filesystem to create if the volume cannot be mounted
    #[arg(short, long, value_name = "FSTYPE")]
    pub format: Option<String>,

    /// Directory mountpoints are created under
    #[arg(long, env = "VOLMOUNT_ROOT", default_value = "/mnt/ebs")]
    pub mount_root: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The volume is mounted here.
    Mounted(PathBuf),
    /// The volume was unmounted and detached.
    Unmounted,
    /// Nothing was mounted.
    NotMounted,
}

impl Cli {
    /// Configuration derived from the flags.
    #[must_use]
    pub fn config(&self) -> Config {
        Config::default().with_mount_root(self.mount_root.clone())
    }

    /// Filesystem to format with; an empty value means none.
    #[must_use]
    pub fn fstype(&self) -> Option<&str> {
        self.format.as_deref().filter(|f| !f.is_empty())
    }

    /// Log filter: `RUST_LOG` when set, `volmount=info` otherwise.
    /// `--debug` raises volmount to debug on top of either.
    #[must_use]
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::new(log_directives(
            std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
            self.debug,
        ))
    }

    /// Run the requested operation on `volume`.
    ///
    /// # Errors
    ///
    /// Returns the terminal mount or unmount failure.
    pub async fn execute(&self, volume: &VolumeId) -> VolmountResult<Outcome> {
        let manager = VolumeManager::connect(&self.config()).await?;

        if self.unmount {
            return Ok(match manager.unmount(volume).await? {
                UnmountOutcome::Unmounted => Outcome::Unmounted,
                UnmountOutcome::NotMounted => Outcome::NotMounted,
            });
        }

        let mountpoint = manager.mount(volume, self.fstype()).await?;
        Ok(Outcome::Mounted(mountpoint))
    }
}

fn log_directives(env: Option<&str>, debug: bool) -> String {
    let base = env.map(str::trim).filter(|d| !d.is_empty());
    match (base, debug) {
        (Some(base), true) => format!("{base},volmount=debug"),
        (Some(base), false) => base.to_string(),
        (None, true) => "volmount=debug".to_string(),
        (None, false) => "volmount=info".to_string(),
    }
}
