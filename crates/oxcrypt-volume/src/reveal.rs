//! Opening a mount point in the platform file manager.

use std::io;
use std::path::Path;
use std::process::Command;

/// Program and leading arguments used to reveal a directory on this host.
fn reveal_command() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(target_os = "windows") {
        ("explorer", &[])
    } else {
        ("xdg-open", &[])
    }
}

/// Open `mountpoint` in Finder, Explorer or the desktop's default browser.
///
/// For [`MountHandle::reveal_in_file_manager`](crate::MountHandle::reveal_in_file_manager)
/// implementations.
///
/// # Errors
///
/// Fails if `mountpoint` is not a directory, the opener cannot be spawned,
/// or it exits unsuccessfully. `explorer` exits with status 1 even on
/// success, so its exit status is ignored.
pub fn reveal_in_file_manager(mountpoint: &Path) -> io::Result<()> {
    if !mountpoint.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", mountpoint.display()),
        ));
    }

    let (program, args) = reveal_command();
    let status = Command::new(program).args(args).arg(mountpoint).status()?;

    if status.success() || cfg!(target_os = "windows") {
        tracing::debug!(mountpoint = %mountpoint.display(), "Revealed in file manager");
        Ok(())
    } else {
        Err(io::Error::other(format!(
            "{program} exited with {status} for {}",
            mountpoint.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_is_not_revealed() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = reveal_in_file_manager(&temp.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn opener_matches_host() {
        let (program, _) = reveal_command();
        if cfg!(target_os = "macos") {
            assert_eq!(program, "open");
        } else if cfg!(target_os = "windows") {
            assert_eq!(program, "explorer");
        } else {
            assert_eq!(program, "xdg-open");
        }
    }
}
