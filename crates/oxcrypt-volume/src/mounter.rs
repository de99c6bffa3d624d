//! Boundary to the native FUSE mounter.
//!
//! The crate never talks to a FUSE driver directly. A [`VolumeMounter`] turns
//! a decrypted root plus [`MountOptions`] into a live [`MountHandle`], and the
//! handle is the only way to unmount, force-unmount or reveal that mount.

use std::io;
use std::path::{Path, PathBuf};

/// A single live OS-level mount.
///
/// Owned exclusively by the [`FuseVolume`](crate::FuseVolume) that created it.
/// A failed `unmount`/`unmount_forced` must leave the mount usable so the
/// caller can retry; `release` is only called after a successful unmount (or
/// when the volume is dropped) and must tolerate being called more than once.
pub trait MountHandle: Send {
    /// Gracefully unmount. Fails if the filesystem is busy.
    fn unmount(&mut self) -> io::Result<()>;

    /// Unmount even if files are still open.
    fn unmount_forced(&mut self) -> io::Result<()>;

    /// Open the mount point in the platform file manager.
    fn reveal_in_file_manager(&self) -> io::Result<()>;

    /// Release resources held for the mount (session threads, sockets).
    fn release(&mut self);
}

/// Native mounting capability (e.g. a fuser session spawner).
pub trait VolumeMounter: Send + Sync {
    /// Mount the decrypted filesystem rooted at `root`.
    ///
    /// # Errors
    ///
    /// Any failure of the native mount; the caller wraps it in
    /// [`VolumeError::MountFailed`](crate::VolumeError::MountFailed).
    fn mount(&self, root: &Path, options: &MountOptions) -> io::Result<Box<dyn MountHandle>>;
}

/// Options handed to the native mounter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOptions {
    flags: Vec<String>,
    mount_point: PathBuf,
}

impl MountOptions {
    /// Combine discrete flag tokens and a resolved mount point.
    pub fn new(flags: Vec<String>, mount_point: impl Into<PathBuf>) -> Self {
        Self {
            flags,
            mount_point: mount_point.into(),
        }
    }

    /// Build options from a raw flag string (see [`split_flags`]).
    pub fn from_flag_string(mount_flags: &str, mount_point: impl Into<PathBuf>) -> Self {
        Self::new(split_flags(mount_flags), mount_point)
    }

    /// Flag tokens, in order.
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Where the filesystem will appear.
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }
}

/// Split a raw mount flag string into tokens.
///
/// Splits on every single space character; there is no quoting or escaping.
/// An empty string yields one empty token and consecutive spaces yield empty
/// tokens in between. Mounters that cannot handle empty tokens must filter
/// them themselves.
///
/// ```
/// use oxcrypt_volume::split_flags;
///
/// assert_eq!(split_flags("-o allow_other"), vec!["-o", "allow_other"]);
/// assert_eq!(split_flags(""), vec![""]);
/// ```
pub fn split_flags(mount_flags: &str) -> Vec<String> {
    mount_flags.split(' ').map(str::to_owned).collect()
}
