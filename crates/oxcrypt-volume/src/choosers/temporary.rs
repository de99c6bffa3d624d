//! Chooser generating a throwaway mount point below a root directory.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chooser::MountPointChooser;
use crate::error::ChooserError;
use crate::mount_utils::{find_available_mountpoint, DEFAULT_ACCESS_TIMEOUT};
use crate::requirement::MountPointRequirement;

/// Picks `root/name`, or `root/name-N` if that is taken, and creates it.
///
/// Only paths that do not exist yet are offered, so every mount point this
/// chooser prepares is its own and `cleanup` never removes a directory some
/// other volume or user put there. The root itself is shared between vaults
/// and stays.
#[derive(Debug, Clone)]
pub struct TemporaryMountPointChooser {
    root: PathBuf,
    name: String,
    requirement: MountPointRequirement,
    timeout: Duration,
}

impl TemporaryMountPointChooser {
    /// Chooser for mount points named after `name` below `root`.
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
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

    /// Directory below which mount points are generated.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl MountPointChooser for TemporaryMountPointChooser {
    fn id(&self) -> &str {
        "temporary"
    }

    fn choose_mount_point(&self) -> Option<PathBuf> {
        let base = self.root.join(&self.name);
        match find_available_mountpoint(&base, self.timeout) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::debug!(base = %base.display(), "No temporary mount point: {}", e);
                None
            }
        }
    }

    fn prepare(&self, path: &Path) -> Result<bool, ChooserError> {
        std::fs::create_dir_all(&self.root).map_err(|e| ChooserError::io(&self.root, e))?;

        if self.requirement == MountPointRequirement::EmptyMountPoint {
            // Appeared since it was chosen: not ours to clean up later
            std::fs::create_dir(path).map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => ChooserError::AlreadyExists(path.to_path_buf()),
                _ => ChooserError::io(path, e),
            })?;
        }

        tracing::debug!(mountpoint = %path.display(), "Prepared temporary mount point");
        Ok(true)
    }

    fn cleanup(&self, path: &Path) {
        // remove_dir refuses non-empty directories, so user data is never lost
        match std::fs::remove_dir(path) {
            Ok(()) => {
                tracing::debug!(mountpoint = %path.display(), "Removed temporary mount point");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    mountpoint = %path.display(),
                    "Could not remove temporary mount point: {}",
                    e
                );
            }
        }
    }
}
