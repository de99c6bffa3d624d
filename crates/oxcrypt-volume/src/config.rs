//! Volume configuration.
//!
//! [`VolumeConfig`] is what a settings file stores about mounting: where the
//! user wants vaults to appear, how long mount point probes may take and
//! which FUSE flags to pass. It also assembles the ordered chooser list that
//! a [`FuseVolume`](crate::FuseVolume) is built with.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chooser::MountPointChooser;
use crate::choosers::{CustomMountPointChooser, TemporaryMountPointChooser};
use crate::mount_utils::DEFAULT_ACCESS_TIMEOUT;
use crate::requirement::{HostOs, MountPointRequirement};

/// Mount settings for a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Mount point picked by the user. Tried before any generated one.
    pub custom_mount_point: Option<PathBuf>,

    /// Root for generated mount points.
    ///
    /// Default: `<temp dir>/oxcrypt`.
    pub temp_mount_root: Option<PathBuf>,

    /// Timeout for probing mount point candidates.
    ///
    /// Default: 500ms.
    #[serde(with = "humantime_serde")]
    pub access_timeout: Duration,

    /// Run the chooser's cleanup if mounting fails after a mount point was
    /// prepared. Disable to keep the prepared path for inspection.
    ///
    /// Default: `true`.
    pub rollback_on_mount_failure: bool,

    /// Raw flag string passed to the mounter, split on single spaces.
    ///
    /// Default: [`default_mount_flags`] for the current host.
    pub mount_flags: Option<String>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            custom_mount_point: None,
            temp_mount_root: None,
            access_timeout: DEFAULT_ACCESS_TIMEOUT,
            rollback_on_mount_failure: true,
            mount_flags: None,
        }
    }
}

impl VolumeConfig {
    /// Use a fixed mount point ahead of generated ones.
    #[must_use]
    pub fn custom_mount_point(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_mount_point = Some(path.into());
        self
    }

    /// Generate mount points below `root`.
    #[must_use]
    pub fn temp_mount_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_mount_root = Some(root.into());
        self
    }

    /// Sets the probe timeout.
    #[must_use]
    pub fn access_timeout(mut self, timeout: Duration) -> Self {
        self.access_timeout = timeout;
        self
    }

    /// Sets the rollback policy for failed mounts.
    #[must_use]
    pub fn rollback_on_mount_failure(mut self, rollback: bool) -> Self {
        self.rollback_on_mount_failure = rollback;
        self
    }

    /// Sets an explicit flag string.
    #[must_use]
    pub fn mount_flags_override(mut self, flags: impl Into<String>) -> Self {
        self.mount_flags = Some(flags.into());
        self
    }

    /// Effective root for generated mount points.
    pub fn effective_temp_mount_root(&self) -> PathBuf {
        self.temp_mount_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("oxcrypt"))
    }

    /// Effective flag string for the vault called `vault_name`.
    pub fn mount_flags(&self, vault_name: &str) -> String {
        self.mount_flags
            .clone()
            .unwrap_or_else(|| default_mount_flags(HostOs::current(), vault_name))
    }

    /// Ordered chooser list: custom mount point first, generated one second.
    pub fn choosers(&self, vault_name: &str) -> Vec<Box<dyn MountPointChooser>> {
        let requirement = MountPointRequirement::current();
        let mut choosers: Vec<Box<dyn MountPointChooser>> = Vec::new();

        if let Some(path) = &self.custom_mount_point {
            choosers.push(Box::new(
                CustomMountPointChooser::new(path)
                    .requirement(requirement)
                    .timeout(self.access_timeout),
            ));
        }

        choosers.push(Box::new(
            TemporaryMountPointChooser::new(self.effective_temp_mount_root(), vault_name)
                .requirement(requirement)
                .timeout(self.access_timeout),
        ));

        choosers
    }
}

/// Default FUSE flags for `host`.
///
/// The fsname carries the `cryptomator:` marker used to recognize our own
/// mounts in the mount table. The flag string is split on spaces, so a vault
/// name containing a space produces broken flags; callers should sanitize
/// names first.
pub fn default_mount_flags(host: HostOs, vault_name: &str) -> String {
    match host {
        HostOs::MacOs => format!(
            "-ovolname={vault_name} -ofsname=cryptomator:{vault_name} -onoappledouble -odaemon_timeout=30"
        ),
        HostOs::Linux => {
            format!("-oauto_unmount -ofsname=cryptomator:{vault_name} -osubtype=oxcrypt")
        }
        HostOs::Windows => format!("-ouid=-1 -ogid=-1 -ovolname={vault_name}"),
        HostOs::Other => format!("-ofsname=cryptomator:{vault_name}"),
    }
}
