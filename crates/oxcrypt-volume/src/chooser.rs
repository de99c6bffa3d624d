//! Ordered mount point selection.
//!
//! Choosers are consulted strictly in the order they were configured. The
//! first one that offers a candidate *and* prepares it wins. A chooser without
//! a candidate is skipped; a chooser whose preparation fails aborts the whole
//! resolution, even if a later chooser could have succeeded.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{ChooserError, Result, VolumeError};

/// Strategy for proposing and preparing a mount point.
///
/// Implementations must honor the host's
/// [`MountPointRequirement`](crate::MountPointRequirement) in `prepare`.
pub trait MountPointChooser: Send + Sync {
    /// Stable identifier used in diagnostics.
    fn id(&self) -> &str;

    /// Propose a candidate, or `None` if this chooser has nothing to offer
    /// right now. `None` is not an error.
    fn choose_mount_point(&self) -> Option<PathBuf>;

    /// Make `path` ready for mounting.
    ///
    /// Returns `true` if side effects were performed that [`cleanup`] must
    /// undo once the mount point is no longer in use.
    ///
    /// [`cleanup`]: MountPointChooser::cleanup
    fn prepare(&self, path: &Path) -> Result<bool, ChooserError>;

    /// Undo the side effects of [`prepare`](MountPointChooser::prepare).
    ///
    /// Only called if `prepare` returned `true`, at most once per mount.
    /// Failures are logged by the chooser, not propagated.
    fn cleanup(&self, path: &Path);
}

/// Outcome of a successful resolution.
pub struct ResolvedMountPoint<'a> {
    /// Prepared mount point
    pub path: PathBuf,
    /// Chooser that produced it
    pub chooser: &'a dyn MountPointChooser,
    /// Position of that chooser in the configured list
    pub index: usize,
    /// Whether the chooser's cleanup must run on teardown
    pub cleanup_required: bool,
}

impl std::fmt::Debug for ResolvedMountPoint<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedMountPoint")
            .field("path", &self.path)
            .field("chooser", &self.chooser.id())
            .field("index", &self.index)
            .field("cleanup_required", &self.cleanup_required)
            .finish()
    }
}

/// Run the chooser pipeline.
///
/// # Errors
///
/// - [`VolumeError::ChooserPreparation`] as soon as a chooser's `prepare`
///   fails; remaining choosers are not consulted.
/// - [`VolumeError::NoFeasibleMountPoint`] if no chooser offered a candidate.
pub fn resolve_mount_point(
    choosers: &[Box<dyn MountPointChooser>],
) -> Result<ResolvedMountPoint<'_>> {
    for (index, chooser) in choosers.iter().enumerate() {
        let Some(path) = chooser.choose_mount_point() else {
            tracing::debug!(chooser = chooser.id(), "Chooser has no mount point candidate");
            continue;
        };

        tracing::debug!(
            chooser = chooser.id(),
            mountpoint = %path.display(),
            "Preparing mount point candidate"
        );
        let cleanup_required =
            chooser
                .prepare(&path)
                .map_err(|source| VolumeError::ChooserPreparation {
                    chooser: chooser.id().to_string(),
                    path: path.clone(),
                    source,
                })?;

        return Ok(ResolvedMountPoint {
            path,
            chooser: chooser.as_ref(),
            index,
            cleanup_required,
        });
    }

    let tried: BTreeSet<String> = choosers.iter().map(|c| c.id().to_string()).collect();
    Err(VolumeError::NoFeasibleMountPoint { tried })
}
