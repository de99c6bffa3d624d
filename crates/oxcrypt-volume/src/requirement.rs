//! Host-dependent mount point requirements.
//!
//! FUSE implementations disagree on who creates the mount point directory.
//! libfuse and macFUSE mount over an existing empty directory, while WinFsp
//! creates the directory itself and refuses to mount over an existing one.

use serde::{Deserialize, Serialize};

/// Operating system family, as far as mount point handling is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    /// Windows (WinFsp)
    Windows,
    /// macOS (macFUSE)
    MacOs,
    /// Linux (libfuse / fusermount)
    Linux,
    /// Anything else
    Other,
}

impl HostOs {
    /// Classify the host this binary was compiled for.
    pub const fn current() -> Self {
        if cfg!(target_os = "windows") {
            HostOs::Windows
        } else if cfg!(target_os = "macos") {
            HostOs::MacOs
        } else if cfg!(target_os = "linux") {
            HostOs::Linux
        } else {
            HostOs::Other
        }
    }
}

/// What a chooser's `prepare` step must guarantee before mounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MountPointRequirement {
    /// The mount point must be an existing, empty directory.
    EmptyMountPoint,
    /// The parent must exist, the mount point itself must not.
    ParentNoMountPoint,
}

impl MountPointRequirement {
    /// Requirement for the given host.
    pub const fn for_host(os: HostOs) -> Self {
        match os {
            HostOs::Windows => MountPointRequirement::ParentNoMountPoint,
            HostOs::MacOs | HostOs::Linux | HostOs::Other => MountPointRequirement::EmptyMountPoint,
        }
    }

    /// Requirement for the current host.
    pub const fn current() -> Self {
        Self::for_host(HostOs::current())
    }
}
