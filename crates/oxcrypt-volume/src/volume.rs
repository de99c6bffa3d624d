//! Volume lifecycle orchestration.
//!
//! [`FuseVolume`] glues the chooser pipeline to a [`VolumeMounter`] and owns
//! the resulting [`MountHandle`] until the volume is unmounted.
//!
//! # State
//!
//! Mount point, handle, originating chooser and cleanup flag live together in
//! one `Option<ActiveMount>` behind a single lock. They are set together after
//! a successful mount and taken together after a successful unmount, so no
//! caller ever observes a half-mounted volume.
//!
//! # Concurrency
//!
//! Every operation holds the lock for its whole duration, including the
//! native mount/unmount call. Concurrent `mount`/`unmount`/`unmount_forced`
//! on one volume are therefore serialized; a losing `mount` sees
//! [`VolumeError::AlreadyMounted`], a losing unmount sees
//! [`VolumeError::NotMounted`].
//!
//! The lock is also held while the choosers run. A chooser that probes the
//! filesystem can take a while (the temporary chooser may probe up to 99
//! candidates, each bounded by its access timeout), and for that whole time
//! `mount_point()`, `is_mounted()` and `reveal()` block too.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::instrument;

use crate::chooser::{resolve_mount_point, MountPointChooser};
use crate::error::{Result, VolumeError};
use crate::mounter::{split_flags, MountHandle, MountOptions, VolumeMounter};
use crate::requirement::MountPointRequirement;

/// Capability to expose a decrypted filesystem at some mount point.
///
/// Callers only see this trait and never learn which chooser or mounter
/// produced the mount.
pub trait Volume: Send + Sync {
    /// Acquire a mount point and mount `root` there.
    ///
    /// `mount_flags` is split on single spaces (see [`split_flags`]).
    fn mount(&self, root: &Path, mount_flags: &str) -> Result<()>;

    /// Open the mount point in the file manager.
    fn reveal(&self) -> Result<()>;

    /// Gracefully unmount. On failure the volume stays mounted.
    fn unmount(&self) -> Result<()>;

    /// Unmount even if the filesystem is busy. On failure the volume stays
    /// mounted.
    fn unmount_forced(&self) -> Result<()>;

    /// Whether [`unmount_forced`](Volume::unmount_forced) is meaningful.
    fn supports_forced_unmount(&self) -> bool;

    /// Whether this kind of volume can be mounted on this host at all.
    fn is_supported(&self) -> bool;

    /// Current mount point, if mounted.
    fn mount_point(&self) -> Option<PathBuf>;

    /// What choosers must guarantee about the mount point on this host.
    fn mount_point_requirement(&self) -> MountPointRequirement;
}

/// Whether a FUSE implementation is installed on this host.
///
/// Pure environment check, independent of any volume.
pub fn is_fuse_supported() -> bool {
    #[cfg(target_os = "macos")]
    {
        Path::new("/Library/Filesystems/macfuse.fs").exists()
    }
    #[cfg(target_os = "linux")]
    {
        Path::new("/dev/fuse").exists()
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("ProgramFiles(x86)")
            .map(PathBuf::from)
            .is_some_and(|dir| dir.join("WinFsp").join("bin").join("winfsp-x64.dll").exists())
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        false
    }
}

/// Everything that exists only while mounted.
struct ActiveMount {
    mount_point: PathBuf,
    handle: Box<dyn MountHandle>,
    /// Index into `FuseVolume::choosers`
    chooser: usize,
    cleanup_required: bool,
}

/// [`Volume`] backed by a FUSE mounter and an ordered chooser list.
pub struct FuseVolume {
    choosers: Vec<Box<dyn MountPointChooser>>,
    mounter: Arc<dyn VolumeMounter>,
    rollback_on_mount_failure: bool,
    state: Mutex<Option<ActiveMount>>,
}

impl std::fmt::Debug for FuseVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let choosers: Vec<&str> = self.choosers.iter().map(|c| c.id()).collect();
        f.debug_struct("FuseVolume")
            .field("choosers", &choosers)
            .field(
                "mount_point",
                &self
                    .state
                    .try_lock()
                    .map(|state| state.as_ref().map(|a| a.mount_point.clone())),
            )
            .field("rollback_on_mount_failure", &self.rollback_on_mount_failure)
            .finish_non_exhaustive()
    }
}

impl FuseVolume {
    /// Volume trying `choosers` in order and mounting through `mounter`.
    pub fn new(choosers: Vec<Box<dyn MountPointChooser>>, mounter: Arc<dyn VolumeMounter>) -> Self {
        Self {
            choosers,
            mounter,
            rollback_on_mount_failure: true,
            state: Mutex::new(None),
        }
    }

    /// Whether a failed mount runs the cleanup of an already prepared mount
    /// point. Default: `true`.
    #[must_use]
    pub fn rollback_on_mount_failure(mut self, rollback: bool) -> Self {
        self.rollback_on_mount_failure = rollback;
        self
    }

    /// Whether a mount is currently active.
    pub fn is_mounted(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Static form of [`Volume::is_supported`].
    pub fn is_supported_static() -> bool {
        is_fuse_supported()
    }

    /// Release the handle, then let the originating chooser clean up.
    fn release(&self, mut active: ActiveMount) {
        active.handle.release();
        if active.cleanup_required {
            self.choosers[active.chooser].cleanup(&active.mount_point);
        }
    }

    fn unmount_with(&self, forced: bool) -> Result<()> {
        let mut state = self.state.lock();
        let active = state.as_mut().ok_or(VolumeError::NotMounted)?;

        let result = if forced {
            active.handle.unmount_forced()
        } else {
            active.handle.unmount()
        };
        result.map_err(|source| VolumeError::UnmountFailed {
            mountpoint: active.mount_point.clone(),
            forced,
            source,
        })?;

        if let Some(active) = state.take() {
            tracing::info!(
                mountpoint = %active.mount_point.display(),
                forced,
                "Volume unmounted"
            );
            self.release(active);
        }
        Ok(())
    }
}

impl Volume for FuseVolume {
    #[instrument(level = "info", name = "volume::mount", skip_all, fields(root = %root.display()))]
    fn mount(&self, root: &Path, mount_flags: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(active) = state.as_ref() {
            return Err(VolumeError::AlreadyMounted(active.mount_point.clone()));
        }

        let resolved = resolve_mount_point(&self.choosers)?;
        let options = MountOptions::new(split_flags(mount_flags), resolved.path.clone());

        match self.mounter.mount(root, &options) {
            Ok(handle) => {
                tracing::info!(
                    mountpoint = %resolved.path.display(),
                    chooser = resolved.chooser.id(),
                    "Volume mounted"
                );
                *state = Some(ActiveMount {
                    mount_point: resolved.path,
                    handle,
                    chooser: resolved.index,
                    cleanup_required: resolved.cleanup_required,
                });
                Ok(())
            }
            Err(source) => {
                if resolved.cleanup_required {
                    if self.rollback_on_mount_failure {
                        resolved.chooser.cleanup(&resolved.path);
                    } else {
                        tracing::warn!(
                            mountpoint = %resolved.path.display(),
                            chooser = resolved.chooser.id(),
                            "Mount failed, leaving prepared mount point in place"
                        );
                    }
                }
                Err(VolumeError::MountFailed {
                    mountpoint: resolved.path,
                    source,
                })
            }
        }
    }

    fn reveal(&self) -> Result<()> {
        let state = self.state.lock();
        let active = state.as_ref().ok_or(VolumeError::NotMounted)?;
        active.handle.reveal_in_file_manager().map_err(|source| {
            tracing::debug!("Revealing the vault in file manager failed: {}", source);
            VolumeError::RevealFailed {
                mountpoint: active.mount_point.clone(),
                source,
            }
        })
    }

    #[instrument(level = "info", name = "volume::unmount", skip_all)]
    fn unmount(&self) -> Result<()> {
        self.unmount_with(false)
    }

    #[instrument(level = "info", name = "volume::unmount_forced", skip_all)]
    fn unmount_forced(&self) -> Result<()> {
        self.unmount_with(true)
    }

    fn supports_forced_unmount(&self) -> bool {
        true
    }

    fn is_supported(&self) -> bool {
        Self::is_supported_static()
    }

    fn mount_point(&self) -> Option<PathBuf> {
        self.state.lock().as_ref().map(|a| a.mount_point.clone())
    }

    fn mount_point_requirement(&self) -> MountPointRequirement {
        MountPointRequirement::current()
    }
}

impl Drop for FuseVolume {
    fn drop(&mut self) {
        let Some(mut active) = self.state.get_mut().take() else {
            return;
        };

        tracing::warn!(
            mountpoint = %active.mount_point.display(),
            "Volume dropped while mounted, forcing unmount"
        );
        match active.handle.unmount_forced() {
            Ok(()) => self.release(active),
            Err(e) => {
                // Still in use: release the handle but keep the mount point
                tracing::warn!(
                    mountpoint = %active.mount_point.display(),
                    "Forced unmount on drop failed: {}",
                    e
                );
                active.handle.release();
            }
        }
    }
}
