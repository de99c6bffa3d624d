//! Chooser for a mount point configured by the user.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chooser::MountPointChooser;
use crate::error::ChooserError;
use crate::mount_utils::{
    check_mountpoint_status, is_directory_empty, MountPointStatus, DEFAULT_ACCESS_TIMEOUT,
};
use crate::requirement::MountPointRequirement;

/// Uses exactly the configured path, never creating or removing anything.
///
/// The user owns the directory, so `prepare` only validates and never asks
/// for cleanup.
#[derive(Debug, Clone)]
pub struct CustomMountPointChooser {
    path: PathBuf,
    requirement: MountPointRequirement,
    timeout: Duration,
}

impl CustomMountPointChooser {
    /// Chooser for `path` under the current host's requirement.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            requirement: MountPointRequirement::current(),
            timeout: DEFAULT_ACCESS_TIMEOUT,
        }
    }

    /// Override the requirement (mainly for tests and cross-host setups).
    #[must_use]
    pub fn requirement(mut self, requirement: MountPointRequirement) -> Self {
        self.requirement = requirement;
        self
    }

    /// Timeout for filesystem probes.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn prepare_empty_mount_point(&self, path: &Path) -> Result<bool, ChooserError> {
        match check_mountpoint_status(path, self.timeout) {
            MountPointStatus::Available if is_directory_empty(path, self.timeout) => Ok(false),
            MountPointStatus::Available => Err(ChooserError::NotEmpty(path.to_path_buf())),
            MountPointStatus::NotADirectory => Err(ChooserError::NotADirectory(path.to_path_buf())),
            MountPointStatus::DoesNotExist => Err(ChooserError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "mount point does not exist"),
            )),
            MountPointStatus::ParentInaccessible => {
                Err(ChooserError::ParentMissing(path.to_path_buf()))
            }
            MountPointStatus::StaleMountDetected => Err(ChooserError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::TimedOut, "stale mount detected"),
            )),
            MountPointStatus::Error(e) => Err(ChooserError::io(path, std::io::Error::other(e))),
        }
    }

    fn prepare_absent_mount_point(&self, path: &Path) -> Result<bool, ChooserError> {
        let parent_exists = path
            .parent()
            .is_some_and(|parent| parent.as_os_str().is_empty() || parent.is_dir());
        if !parent_exists {
            return Err(ChooserError::ParentMissing(path.to_path_buf()));
        }

        match check_mountpoint_status(path, self.timeout) {
            MountPointStatus::DoesNotExist => Ok(false),
            MountPointStatus::Error(e) => Err(ChooserError::io(path, std::io::Error::other(e))),
            _ => Err(ChooserError::AlreadyExists(path.to_path_buf())),
        }
    }
}

impl MountPointChooser for CustomMountPointChooser {
    fn id(&self) -> &str {
        "custom"
    }

    fn choose_mount_point(&self) -> Option<PathBuf> {
        if check_mountpoint_status(&self.path, self.timeout) == MountPointStatus::ParentInaccessible
        {
            tracing::debug!(
                mountpoint = %self.path.display(),
                "Parent of custom mount point is inaccessible"
            );
            return None;
        }
        Some(self.path.clone())
    }

    fn prepare(&self, path: &Path) -> Result<bool, ChooserError> {
        match self.requirement {
            MountPointRequirement::EmptyMountPoint => self.prepare_empty_mount_point(path),
            MountPointRequirement::ParentNoMountPoint => self.prepare_absent_mount_point(path),
        }
    }

    fn cleanup(&self, _path: &Path) {}
}
