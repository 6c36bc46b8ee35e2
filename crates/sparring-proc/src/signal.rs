//! Platform-specific termination of a child and everything it spawned.
//!
//! Callers guarantee the child has not been reaped yet, so the pid (which is
//! also the process group id on unix) still belongs to it.

#[cfg(unix)]
mod imp {
    use log::{debug, info, warn};
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    pub fn request_stop(pid: u32) {
        send(pid, Signal::SIGTERM);
    }

    pub fn force_kill(pid: u32) {
        send(pid, Signal::SIGKILL);
    }

    fn send(pid: u32, sig: Signal) {
        let Ok(raw) = i32::try_from(pid) else {
            warn!("PID {pid} out of range, cannot send {sig:?}");
            return;
        };
        let target = Pid::from_raw(raw);

        match signal::killpg(target, sig) {
            Ok(()) => info!("Sent {sig:?} to process group {pid}"),
            // The group is gone; the leader alone may still be around.
            Err(Errno::ESRCH) => match signal::kill(target, sig) {
                Ok(()) => info!("Sent {sig:?} to process {pid}"),
                Err(Errno::ESRCH) => debug!("Process {pid} already gone"),
                Err(e) => warn!("Failed to send {sig:?} to process {pid}: {e}"),
            },
            Err(Errno::EPERM) => warn!("Permission denied to signal process group {pid}"),
            Err(e) => warn!("Failed to send {sig:?} to process group {pid}: {e}"),
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::process::{Command, Stdio};

    use log::{info, warn};

    /// There is no polite stop for an arbitrary console program here, so the
    /// request goes straight to a tree kill.
    pub fn request_stop(pid: u32) {
        force_kill(pid);
    }

    pub fn force_kill(pid: u32) {
        let status = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => info!("Killed process tree {pid}"),
            Ok(s) => warn!("taskkill for process {pid} exited with {s}"),
            Err(e) => warn!("Failed to run taskkill for process {pid}: {e}"),
        }
    }
}

pub(crate) use imp::{force_kill, request_stop};
