//! Portable [`MountPointChooser`](crate::MountPointChooser) implementations.
//!
//! - [`CustomMountPointChooser`] - A path the user picked explicitly
//! - [`TemporaryMountPointChooser`] - A generated directory below a root
//!
//! Both honor the host's [`MountPointRequirement`](crate::MountPointRequirement)
//! when preparing a candidate.

mod custom;
mod temporary;

pub use custom::CustomMountPointChooser;
pub use temporary::TemporaryMountPointChooser;
