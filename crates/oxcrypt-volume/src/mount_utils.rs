//! Timeout-protected probes for mount point candidates.
//!
//! A FUSE daemon that died without unmounting leaves a stale mount behind:
//! any `stat` below it blocks forever. Every probe here runs on a helper
//! thread and gives up after a timeout, so a chooser never hangs on one.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

/// Default timeout for filesystem accessibility checks
pub const DEFAULT_ACCESS_TIMEOUT: Duration = Duration::from_millis(500);

/// Highest numeric suffix tried by [`find_available_mountpoint`]
const MAX_SUFFIX: u32 = 99;

/// State of a candidate path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountPointStatus {
    /// Existing, readable directory
    Available,
    /// Probe timed out or directory unreadable; likely a dead FUSE mount
    StaleMountDetected,
    /// Nothing at this path
    DoesNotExist,
    /// Path exists but is not a directory
    NotADirectory,
    /// Parent could not be probed
    ParentInaccessible,
    /// Any other I/O failure
    Error(String),
}

/// Run `probe` on a helper thread.
///
/// `Timeout` means the probe is still blocked (the thread is leaked);
/// `Disconnected` means it panicked.
fn probe_with_timeout<T, F>(timeout: Duration, probe: F) -> Result<T, RecvTimeoutError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(probe());
    });
    rx.recv_timeout(timeout)
}

/// Whether `stat(path)` succeeds within `timeout`.
pub fn is_path_accessible(path: &Path, timeout: Duration) -> bool {
    let path = path.to_path_buf();
    probe_with_timeout(timeout, move || std::fs::metadata(&path).is_ok()).unwrap_or(false)
}

/// Whether `path` is a readable directory without entries.
///
/// Unreadable or slow directories count as non-empty.
pub fn is_directory_empty(path: &Path, timeout: Duration) -> bool {
    let path = path.to_path_buf();
    probe_with_timeout(timeout, move || {
        std::fs::read_dir(&path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
    })
    .unwrap_or(false)
}

fn is_probe_root(parent: &Path) -> bool {
    parent.as_os_str().is_empty() || parent.parent().is_none()
}

/// Classify `path` as a mount point candidate.
pub fn check_mountpoint_status(path: &Path, timeout: Duration) -> MountPointStatus {
    if let Some(parent) = path.parent()
        && !is_probe_root(parent)
        && !is_path_accessible(parent, timeout)
    {
        return MountPointStatus::ParentInaccessible;
    }

    let path = path.to_path_buf();
    let status = probe_with_timeout(timeout, move || match std::fs::metadata(&path) {
        Ok(meta) if meta.is_dir() => match std::fs::read_dir(&path) {
            Ok(mut entries) => {
                let _ = entries.next();
                MountPointStatus::Available
            }
            Err(_) => MountPointStatus::StaleMountDetected,
        },
        Ok(_) => MountPointStatus::NotADirectory,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => MountPointStatus::DoesNotExist,
        Err(e) => MountPointStatus::Error(e.to_string()),
    });

    match status {
        Ok(status) => status,
        Err(RecvTimeoutError::Timeout) => MountPointStatus::StaleMountDetected,
        Err(RecvTimeoutError::Disconnected) => {
            MountPointStatus::Error("Check thread panicked".to_string())
        }
    }
}

/// Find the FUSE mount containing `path`, if any, from the mount table.
#[cfg(target_os = "linux")]
pub fn is_on_fuse_mount(path: &Path) -> Option<PathBuf> {
    let mounts = std::fs::read_to_string("/proc/mounts").ok()?;
    fuse_mount_containing(&mounts, path)
}

/// Innermost `fuse*` entry of a `/proc/mounts`-formatted table containing `path`.
#[cfg(any(target_os = "linux", test))]
fn fuse_mount_containing(mount_table: &str, path: &Path) -> Option<PathBuf> {
    mount_table
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            fs_type.starts_with("fuse").then(|| PathBuf::from(mount_point))
        })
        .filter(|mount_point| path.starts_with(mount_point))
        .max_by_key(|mount_point| mount_point.components().count())
}

/// Find the FUSE mount containing `path`, if any, from the mount table.
#[cfg(target_os = "macos")]
pub fn is_on_fuse_mount(path: &Path) -> Option<PathBuf> {
    use std::process::Command;

    let output = Command::new("mount").output().ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    // `mount_macfuse@osxfuse0 on /Users/me/Vaults/x (macfuse, nodev, nosuid)`
    stdout
        .lines()
        .filter(|line| line.contains("macfuse") || line.contains("osxfuse"))
        .filter_map(|line| {
            let rest = &line[line.find(" on ")? + 4..];
            Some(PathBuf::from(&rest[..rest.find(" (")?]))
        })
        .filter(|mount_point| path.starts_with(mount_point))
        .max_by_key(|mount_point| mount_point.components().count())
}

/// Stub for platforms without a parseable mount table
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub fn is_on_fuse_mount(_path: &Path) -> Option<PathBuf> {
    None
}

/// Find an unused mount point at `base_path` or a numbered sibling of it.
///
/// Tries `base`, then `base-2` up to `base-99`, and returns the first
/// candidate that does not exist yet, regardless of the
/// [`MountPointRequirement`](crate::MountPointRequirement). An existing empty
/// directory may belong to someone else, or be another vault mounted there.
///
/// # Errors
///
/// Fails early if the parent directory cannot be used at all, otherwise
/// [`MountPointError::NoAvailablePath`] once all suffixes are exhausted.
pub fn find_available_mountpoint(
    base_path: &Path,
    timeout: Duration,
) -> Result<PathBuf, MountPointError> {
    if let Some(parent) = base_path.parent()
        && !is_probe_root(parent)
    {
        match check_mountpoint_status(parent, timeout) {
            MountPointStatus::Available => {}
            // Nothing below a missing parent can be taken
            MountPointStatus::DoesNotExist => return Ok(base_path.to_path_buf()),
            MountPointStatus::StaleMountDetected | MountPointStatus::ParentInaccessible => {
                return Err(match is_on_fuse_mount(parent) {
                    Some(fuse_mount) => MountPointError::ParentOnStaleFuseMount {
                        parent: parent.to_path_buf(),
                        fuse_mount,
                    },
                    None => MountPointError::ParentInaccessible(parent.to_path_buf()),
                });
            }
            MountPointStatus::NotADirectory => {
                return Err(MountPointError::ParentNotDirectory(parent.to_path_buf()));
            }
            MountPointStatus::Error(e) => return Err(MountPointError::AccessError(e)),
        }
    }

    let base = base_path.to_string_lossy();
    let candidates = std::iter::once(base_path.to_path_buf())
        .chain((2..=MAX_SUFFIX).map(|suffix| PathBuf::from(format!("{base}-{suffix}"))));

    for candidate in candidates {
        let status = check_mountpoint_status(&candidate, timeout);
        if status == MountPointStatus::DoesNotExist {
            if candidate != base_path {
                tracing::info!(
                    mountpoint = %candidate.display(),
                    "Using alternative mount point"
                );
            }
            return Ok(candidate);
        }

        match status {
            MountPointStatus::ParentInaccessible => {
                return Err(MountPointError::ParentInaccessible(
                    base_path.parent().unwrap_or(base_path).to_path_buf(),
                ));
            }
            MountPointStatus::StaleMountDetected => {
                tracing::warn!(
                    mountpoint = %candidate.display(),
                    "Stale mount detected, trying next candidate"
                );
            }
            _ => {}
        }
    }

    Err(MountPointError::NoAvailablePath {
        base: base_path.to_path_buf(),
        tried: MAX_SUFFIX,
    })
}

/// Errors that can occur when finding a mount point.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MountPointError {
    /// Parent directory is on a stale FUSE mount
    #[error(
        "Cannot mount: parent directory {} is on a stale FUSE mount ({}). \
         Please unmount or force-unmount the stale mount first.",
        .parent.display(),
        .fuse_mount.display()
    )]
    ParentOnStaleFuseMount {
        /// The parent directory path
        parent: PathBuf,
        /// The FUSE mount point containing it
        fuse_mount: PathBuf,
    },

    /// Parent directory is inaccessible
    #[error("Parent directory {} is inaccessible", .0.display())]
    ParentInaccessible(PathBuf),

    /// Parent path is not a directory
    #[error("Parent path {} is not a directory", .0.display())]
    ParentNotDirectory(PathBuf),

    /// Every candidate was taken
    #[error(
        "Could not find available mount point. Tried {} through {}-{}",
        .base.display(),
        .base.display(),
        .tried
    )]
    NoAvailablePath {
        /// The base path that was tried
        base: PathBuf,
        /// Highest suffix tried
        tried: u32,
    },

    /// General access error
    #[error("Error accessing path: {0}")]
    AccessError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn accessible_existing_path() {
        let temp = TempDir::new().unwrap();
        assert!(is_path_accessible(temp.path(), DEFAULT_ACCESS_TIMEOUT));
    }

    #[test]
    fn inaccessible_missing_path() {
        let temp = TempDir::new().unwrap();
        assert!(!is_path_accessible(
            &temp.path().join("missing"),
            DEFAULT_ACCESS_TIMEOUT
        ));
    }

    #[test]
    fn probe_distinguishes_timeout_from_panic() {
        let slow = probe_with_timeout(Duration::from_millis(10), || {
            std::thread::sleep(Duration::from_secs(1));
        });
        assert_eq!(slow, Err(RecvTimeoutError::Timeout));

        let panicked = probe_with_timeout(DEFAULT_ACCESS_TIMEOUT, || -> bool {
            panic!("probe failed");
        });
        assert_eq!(panicked, Err(RecvTimeoutError::Disconnected));

        assert_eq!(probe_with_timeout(DEFAULT_ACCESS_TIMEOUT, || 7), Ok(7));
    }

    #[test]
    fn status_of_missing_path() {
        let temp = TempDir::new().unwrap();
        let status = check_mountpoint_status(&temp.path().join("vault"), DEFAULT_ACCESS_TIMEOUT);
        assert_eq!(status, MountPointStatus::DoesNotExist);
    }

    #[test]
    fn status_of_directory_and_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert_eq!(
            check_mountpoint_status(temp.path(), DEFAULT_ACCESS_TIMEOUT),
            MountPointStatus::Available
        );
        assert_eq!(
            check_mountpoint_status(&file, DEFAULT_ACCESS_TIMEOUT),
            MountPointStatus::NotADirectory
        );
    }

    #[test]
    fn empty_directory_detection() {
        let temp = TempDir::new().unwrap();
        assert!(is_directory_empty(temp.path(), DEFAULT_ACCESS_TIMEOUT));
        fs::write(temp.path().join("file.txt"), "x").unwrap();
        assert!(!is_directory_empty(temp.path(), DEFAULT_ACCESS_TIMEOUT));
    }

    #[test]
    fn prefers_base_path() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("vault");

        let found = find_available_mountpoint(&base, DEFAULT_ACCESS_TIMEOUT).unwrap();
        assert_eq!(found, base);
    }

    #[test]
    fn existing_empty_directory_is_never_offered() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("vault");
        fs::create_dir(&base).unwrap();

        let found = find_available_mountpoint(&base, DEFAULT_ACCESS_TIMEOUT).unwrap();
        assert_eq!(found, temp.path().join("vault-2"));
    }

    #[test]
    fn skips_occupied_suffixes() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("vault");
        for dir in [base.clone(), temp.path().join("vault-2")] {
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("file.txt"), "content").unwrap();
        }

        let found = find_available_mountpoint(&base, DEFAULT_ACCESS_TIMEOUT).unwrap();
        assert_eq!(found, temp.path().join("vault-3"));
    }

    #[test]
    fn parent_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let parent = temp.path().join("not-a-dir");
        fs::write(&parent, "x").unwrap();

        let err = find_available_mountpoint(&parent.join("vault"), DEFAULT_ACCESS_TIMEOUT)
            .unwrap_err();
        assert!(matches!(err, MountPointError::ParentNotDirectory(p) if p == parent));
    }

    #[test]
    fn missing_parent_yields_base() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("mounts").join("vault");

        let found = find_available_mountpoint(&base, DEFAULT_ACCESS_TIMEOUT).unwrap();
        assert_eq!(found, base);
    }

    #[test]
    fn fuse_mount_lookup_picks_innermost_fuse_entry() {
        let table = "\
/dev/sda1 / ext4 rw,relatime 0 0
cryptomator:a /home/me/Vaults fuse.oxcrypt rw,nosuid 0 0
cryptomator:b /home/me/Vaults/b fuse.oxcrypt rw,nosuid 0 0
tmpfs /tmp tmpfs rw 0 0
";
        assert_eq!(
            fuse_mount_containing(table, Path::new("/home/me/Vaults/b/docs")),
            Some(PathBuf::from("/home/me/Vaults/b"))
        );
        assert_eq!(
            fuse_mount_containing(table, Path::new("/home/me/Vaults/c")),
            Some(PathBuf::from("/home/me/Vaults"))
        );
        assert_eq!(fuse_mount_containing(table, Path::new("/tmp/x")), None);
    }
}
