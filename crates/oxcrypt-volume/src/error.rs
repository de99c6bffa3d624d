//! Error types for mount point resolution and the volume lifecycle.

use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::mount_utils::MountPointError;

/// Result type for volume operations.
pub type Result<T, E = VolumeError> = std::result::Result<T, E>;

/// Errors surfaced by [`Volume`](crate::Volume) operations.
#[derive(Error, Debug)]
pub enum VolumeError {
    /// Every chooser was consulted and none offered a candidate.
    ///
    /// `tried` holds the distinct chooser ids, sorted.
    #[error("No feasible mount point found! Tried {}", join_ids(.tried))]
    NoFeasibleMountPoint {
        /// Ids of all choosers that were consulted
        tried: BTreeSet<String>,
    },

    /// A chooser offered a candidate but failed to prepare it.
    ///
    /// Resolution stops here; later choosers are not consulted.
    #[error("Mount point chooser {chooser} failed to prepare {}", .path.display())]
    ChooserPreparation {
        /// Id of the failing chooser
        chooser: String,
        /// Candidate that was being prepared
        path: PathBuf,
        /// Underlying preparation failure
        #[source]
        source: ChooserError,
    },

    /// The native mounter refused to mount.
    #[error("Unable to mount filesystem at {}", .mountpoint.display())]
    MountFailed {
        /// Resolved mount point
        mountpoint: PathBuf,
        /// Failure reported by the mounter
        #[source]
        source: io::Error,
    },

    /// The native unmount failed; the volume is still mounted.
    #[error("{} of {} failed", unmount_label(.forced), .mountpoint.display())]
    UnmountFailed {
        /// Mount point that is still in use
        mountpoint: PathBuf,
        /// Whether a forced unmount was requested
        forced: bool,
        /// Failure reported by the mount handle
        #[source]
        source: io::Error,
    },

    /// Opening the mount point in the file manager failed.
    #[error("Revealing {} in file manager failed", .mountpoint.display())]
    RevealFailed {
        /// Mount point that was to be revealed
        mountpoint: PathBuf,
        /// Failure reported by the mount handle
        #[source]
        source: io::Error,
    },

    /// Operation requires a mounted volume.
    #[error("Volume is not mounted")]
    NotMounted,

    /// `mount()` called on a volume that is already mounted.
    #[error("Volume is already mounted at {}", .0.display())]
    AlreadyMounted(PathBuf),
}

impl VolumeError {
    /// Whether the volume is still mounted after this error.
    ///
    /// Only unmount failures leave a live mount behind.
    pub fn leaves_mounted(&self) -> bool {
        matches!(self, VolumeError::UnmountFailed { .. })
    }
}

fn unmount_label(forced: &bool) -> &'static str {
    if *forced {
        "Forced unmount"
    } else {
        "Unmount"
    }
}

fn join_ids(ids: &BTreeSet<String>) -> String {
    ids.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Errors raised while a chooser prepares a mount point.
#[derive(Error, Debug)]
pub enum ChooserError {
    /// Filesystem operation on the candidate failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// Path being operated on
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Candidate must be an empty directory but has entries.
    #[error("Mount point {} is not empty", .0.display())]
    NotEmpty(PathBuf),

    /// Candidate must not exist yet but does.
    #[error("Mount point {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    /// Parent of the candidate does not exist.
    #[error("Parent of mount point {} does not exist", .0.display())]
    ParentMissing(PathBuf),

    /// Candidate exists but is not a directory.
    #[error("Mount point {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// Candidate could not be probed (e.g. stale FUSE mount).
    #[error(transparent)]
    Inaccessible(#[from] MountPointError),
}

impl ChooserError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ChooserError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_feasible_lists_ids_sorted() {
        let tried: BTreeSet<String> = ["temporary", "custom", "temporary"]
            .into_iter()
            .map(String::from)
            .collect();
        let err = VolumeError::NoFeasibleMountPoint { tried };
        assert_eq!(
            err.to_string(),
            "No feasible mount point found! Tried custom, temporary"
        );
    }

    #[test]
    fn unmount_failure_message_mentions_force() {
        let err = VolumeError::UnmountFailed {
            mountpoint: PathBuf::from("/mnt/vault"),
            forced: true,
            source: io::Error::other("busy"),
        };
        assert_eq!(err.to_string(), "Forced unmount of /mnt/vault failed");
        assert!(err.leaves_mounted());
        assert!(!VolumeError::NotMounted.leaves_mounted());
    }

    #[test]
    fn chooser_preparation_keeps_source() {
        use std::error::Error as _;

        let err = VolumeError::ChooserPreparation {
            chooser: "custom".to_string(),
            path: PathBuf::from("/mnt/vault"),
            source: ChooserError::NotEmpty(PathBuf::from("/mnt/vault")),
        };
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("Mount point /mnt/vault is not empty"));
    }
}
