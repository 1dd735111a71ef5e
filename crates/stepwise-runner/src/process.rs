use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{info, warn};

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// A child process leading its own process group, so the whole tree can be
/// signalled at once.
pub struct ManagedChild {
    child: tokio::process::Child,
    pgid: i32,
}

impl ManagedChild {
    /// SIGTERM the group, wait up to `grace_period`, then SIGKILL.
    pub async fn kill_group(&mut self, grace_period: Duration) {
        if let Err(e) = kill(Pid::from_raw(-self.pgid), Signal::SIGTERM) {
            // ESRCH: already gone
            if e != nix::errno::Errno::ESRCH {
                warn!("SIGTERM to process group {} failed: {e}", self.pgid);
            }
            return;
        }

        if tokio::time::timeout(grace_period, self.child.wait())
            .await
            .is_err()
        {
            if let Err(e) = kill(Pid::from_raw(-self.pgid), Signal::SIGKILL) {
                if e != nix::errno::Errno::ESRCH {
                    warn!("SIGKILL to process group {} failed: {e}", self.pgid);
                }
            }
            let _ = self.child.wait().await;
        }
    }
}

fn spawn_managed(
    cmd: &mut Command,
) -> Result<(ManagedChild, tokio::process::ChildStdout, tokio::process::ChildStderr)> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let mut child = cmd.spawn().context("spawn child process")?;
    let pid = child.id().ok_or_else(|| anyhow!("no child PID"))? as i32;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("child stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("child stderr not captured"))?;

    Ok((ManagedChild { child, pgid: pid }, stdout, stderr))
}

/// Run `cmd` to completion with a deadline. On timeout the whole process
/// group is killed and an error is returned.
pub async fn run_managed_with_timeout(
    cmd: &mut Command,
    timeout: Duration,
    kill_grace: Duration,
) -> Result<ProcessOutput> {
    let (mut managed, mut stdout, mut stderr) = spawn_managed(cmd)?;

    let result = tokio::time::timeout(timeout, async {
        let mut stdout_bytes = Vec::new();
        let mut stderr_bytes = Vec::new();
        let (_, _, status) = tokio::try_join!(
            stdout.read_to_end(&mut stdout_bytes),
            stderr.read_to_end(&mut stderr_bytes),
            managed.child.wait()
        )?;
        Ok::<_, anyhow::Error>((stdout_bytes, stderr_bytes, status))
    })
    .await;

    match result {
        Ok(Ok((stdout_bytes, stderr_bytes, status))) => Ok(ProcessOutput {
            success: status.success(),
            stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
            stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
            exit_code: status.code().unwrap_or(-1),
        }),
        Ok(Err(e)) => Err(e),
        Err(_elapsed) => {
            info!("process timed out after {:?}, killing process group", timeout);
            managed.kill_group(kill_grace).await;
            Err(anyhow!("process timed out after {:?}", timeout))
        }
    }
}
