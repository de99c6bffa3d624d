//! Mount point acquisition and volume lifecycle for FUSE-mounted vaults.
//!
//! This crate sits between an unlocked vault and the FUSE driver that exposes
//! it. It does not translate file operations; it decides *where* the
//! decrypted view appears, and guarantees that the location is released again.
//!
//! # Components
//!
//! - [`MountPointChooser`] - Strategy proposing and preparing a mount point
//! - [`resolve_mount_point`] - Ordered chooser pipeline (first usable wins)
//! - [`VolumeMounter`] / [`MountHandle`] - Boundary to the native FUSE mounter
//! - [`Volume`] / [`FuseVolume`] - Mount, reveal and unmount orchestration
//! - [`VolumeConfig`] - Serializable settings and chooser assembly
//!
//! # Lifecycle
//!
//! ```text
//! Unmounted --mount()--> Mounted --unmount()/unmount_forced()--> Unmounted
//! ```
//!
//! A failed `mount()` leaves the volume unmounted. A failed unmount leaves it
//! mounted, so the caller may retry without the handle being released twice.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use oxcrypt_volume::{FuseVolume, Volume, VolumeConfig};
//!
//! let config = VolumeConfig::default();
//! let volume = FuseVolume::new(config.choosers("my-vault"), Arc::new(my_mounter))
//!     .rollback_on_mount_failure(config.rollback_on_mount_failure);
//!
//! volume.mount(decrypted_root, &config.mount_flags("my-vault"))?;
//! volume.reveal()?;
//! volume.unmount()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod chooser;
pub mod choosers;
mod config;
mod error;
mod force_unmount;
mod mount_utils;
mod mounter;
mod requirement;
mod reveal;
mod volume;

pub use chooser::{resolve_mount_point, MountPointChooser, ResolvedMountPoint};
pub use choosers::{CustomMountPointChooser, TemporaryMountPointChooser};
pub use config::{default_mount_flags, VolumeConfig};
pub use error::{ChooserError, Result, VolumeError};
pub use force_unmount::{force_unmount, lazy_unmount};
pub use mount_utils::{
    check_mountpoint_status, find_available_mountpoint, is_directory_empty, is_on_fuse_mount,
    is_path_accessible, MountPointError, MountPointStatus, DEFAULT_ACCESS_TIMEOUT,
};
pub use mounter::{split_flags, MountHandle, MountOptions, VolumeMounter};
pub use requirement::{HostOs, MountPointRequirement};
pub use reveal::reveal_in_file_manager;
pub use volume::{is_fuse_supported, FuseVolume, Volume};
