//! Platform force/lazy unmount for [`MountHandle`](crate::MountHandle) implementors.
//!
//! A handle's `unmount_forced` typically first tries its session's own
//! teardown and falls back to these system tools when the filesystem is busy.
//!
//! These functions unmount whatever is mounted at the given path. Callers
//! must only pass mount points they created.
//!
//! - **macOS**: `diskutil unmount force`, then `umount -f`
//! - **Linux**: `fusermount -uz`, then `umount -l`, then `umount -f`
//! - **Other**: unsupported

use std::path::Path;
#[cfg(any(target_os = "macos", target_os = "linux"))]
use std::process::Command;
#[cfg(any(target_os = "macos", target_os = "linux"))]
use std::time::Duration;

use anyhow::Result;

/// Upper bound for a single unmount tool invocation.
///
/// `diskutil` in particular can hang forever on a ghost mount.
#[cfg(any(target_os = "macos", target_os = "linux"))]
const COMMAND_TIMEOUT: Duration = Duration::from_secs(3);

/// Run one unmount tool, returning `Ok(())` if it exited successfully.
#[cfg(any(target_os = "macos", target_os = "linux"))]
fn run_unmount_tool(program: &str, args: &[&str], mountpoint: &Path) -> Result<()> {
    use std::sync::mpsc;

    let mut command = Command::new(program);
    command.args(args).arg(mountpoint);
    let invocation = format!("{program} {}", args.join(" "));

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(command.output());
    });

    let output = match rx.recv_timeout(COMMAND_TIMEOUT) {
        Ok(result) => result.map_err(|e| anyhow::anyhow!("Failed to run {invocation}: {e}"))?,
        Err(_) => anyhow::bail!(
            "{invocation} timed out for {} (possible ghost mount)",
            mountpoint.display()
        ),
    };

    if output.status.success() {
        tracing::debug!(mountpoint = %mountpoint.display(), "{} succeeded", invocation);
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!(
        "{invocation} failed for {}: {}",
        mountpoint.display(),
        stderr.trim()
    )
}

/// Try each tool in order; the first success wins, the last error is returned.
#[cfg(any(target_os = "macos", target_os = "linux"))]
fn first_successful(tools: &[(&str, &[&str])], mountpoint: &Path) -> Result<()> {
    let mut last_error = anyhow::anyhow!("No unmount tool configured");
    for (program, args) in tools {
        match run_unmount_tool(program, args, mountpoint) {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::debug!("{}", e);
                last_error = e;
            }
        }
    }
    Err(last_error)
}

/// Force unmount the filesystem at `mountpoint`, even if busy.
///
/// # Errors
///
/// Returns the error of the last attempted tool if all attempts fail.
pub fn force_unmount(mountpoint: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        first_successful(
            &[("diskutil", &["unmount", "force"]), ("umount", &["-f"])],
            mountpoint,
        )
    }

    #[cfg(target_os = "linux")]
    {
        first_successful(
            &[
                ("fusermount", &["-uz"]),
                ("umount", &["-l"]),
                ("umount", &["-f"]),
            ],
            mountpoint,
        )
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        anyhow::bail!(
            "Force unmount not supported on this platform for {}",
            mountpoint.display()
        )
    }
}

/// Detach the mount immediately, letting open handles drain.
///
/// macOS has no lazy unmount and uses [`force_unmount`] instead.
pub fn lazy_unmount(mountpoint: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        force_unmount(mountpoint)
    }

    #[cfg(target_os = "linux")]
    {
        first_successful(
            &[("fusermount", &["-uz"]), ("umount", &["-l"])],
            mountpoint,
        )
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        anyhow::bail!(
            "Lazy unmount not supported on this platform for {}",
            mountpoint.display()
        )
    }
}
