//! Watcher process supervision: launch, pump output into the hub, restart.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use nowcast_core::{LineFramer, MediaState, ALLOW_ENV};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::error::BridgeError;
use crate::hub::NowPlayingHub;

pub const WATCHER_NAME: &str = "nowcast-watch";

/// How long to wait for buffered stdout after the watcher has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Where to look for the watcher, relative to `base`, in priority order.
pub fn candidate_paths(base: &Path) -> Vec<PathBuf> {
    let exe = format!("{WATCHER_NAME}{}", std::env::consts::EXE_SUFFIX);
    vec![
        base.join(&exe),
        base.join("bin").join(&exe),
        base.join("target").join("release").join(&exe),
        base.join("target")
            .join("x86_64-pc-windows-msvc")
            .join("release")
            .join(&exe),
    ]
}

/// Resolve the watcher executable. An explicit override replaces the search.
pub fn resolve_watcher(base: &Path, explicit: Option<&Path>) -> Result<PathBuf, BridgeError> {
    let candidates = match explicit {
        Some(path) => vec![base.join(path)],
        None => candidate_paths(base),
    };
    let found = candidates.iter().find(|p| p.is_file()).cloned();
    found.ok_or(BridgeError::WatcherNotFound(candidates))
}

/// Log the remediation banner for a missing watcher binary.
pub fn report_missing(err: &BridgeError) {
    error!("==========================================================");
    error!("  {err}");
    error!("  Now-playing updates are disabled until it is built.");
    error!("");
    error!("  Build it with: cargo build --release -p {WATCHER_NAME}");
    error!("  or point watcher.path / --watcher at an existing binary.");
    error!("==========================================================");
}

/// Program and arguments used to start the watcher.
#[derive(Debug, Clone)]
pub struct LaunchTarget {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl LaunchTarget {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
        }
    }
}

/// Owns the single live watcher process and restarts it when it exits.
pub struct Supervisor {
    target: LaunchTarget,
    hub: Arc<NowPlayingHub>,
    restart_delay: Duration,
}

impl Supervisor {
    pub fn new(target: LaunchTarget, hub: Arc<NowPlayingHub>, restart_delay: Duration) -> Self {
        Self {
            target,
            hub,
            restart_delay,
        }
    }

    /// Run forever. Every exit, clean or not, publishes `HelperExited` and
    /// schedules exactly one restart after the fixed delay.
    pub async fn run(self) {
        loop {
            match self.run_once().await {
                Ok(status) => warn!(code = ?status.code(), "watcher exited"),
                Err(e) => error!(error = %e, "failed to run watcher"),
            }
            self.hub.publish(MediaState::helper_exited()).await;
            info!(delay_secs = self.restart_delay.as_secs_f64(), "restarting watcher");
            tokio::time::sleep(self.restart_delay).await;
        }
    }

    /// Spawn the watcher and wait for it to exit. Output is pumped into the
    /// hub until the process is gone and its stdout drained, so the caller
    /// can start a replacement without two watchers overlapping.
    pub async fn run_once(&self) -> Result<ExitStatus, BridgeError> {
        let mut command = Command::new(&self.target.program);
        command
            .args(&self.target.args)
            .env(ALLOW_ENV, self.hub.policy().to_env_value())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = command.spawn()?;
        info!(
            pid = ?child.id(),
            program = %self.target.program.display(),
            "watcher started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("watcher stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("watcher stderr not captured"))?;

        let mut stdout_pump = tokio::spawn(pump_stdout(stdout, Arc::clone(&self.hub)));
        let mut stderr_pump = tokio::spawn(pump_stderr(stderr));

        let status = child.wait().await?;

        // A grandchild can keep the pipes open; both pumps share one deadline
        // and are cancelled past it, so no line from this run reaches the hub
        // after we return.
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            let _ = tokio::join!(&mut stdout_pump, &mut stderr_pump);
        })
        .await;
        if drained.is_err() {
            warn!("watcher output still open after exit; cancelling readers");
            stdout_pump.abort();
            stderr_pump.abort();
            let _ = tokio::join!(stdout_pump, stderr_pump);
        }

        Ok(status)
    }
}

/// Frame stdout into lines and hand each one to the hub.
async fn pump_stdout<R: AsyncRead + Unpin>(mut stdout: R, hub: Arc<NowPlayingHub>) {
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        let n = match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "watcher stdout read failed");
                break;
            }
        };
        for line in framer.feed(&buf[..n]) {
            if let Err(e) = hub.accept_line(&line).await {
                warn!(error = %e, line = %line, "dropping malformed watcher line");
            }
        }
        let dropped = framer.take_overflows();
        if dropped > 0 {
            warn!(dropped, "dropping oversized watcher output");
        }
    }
    if let Some(rest) = framer.take_remainder() {
        warn!(line = %rest, "discarding unterminated watcher output");
    }
}

/// Re-log the watcher's diagnostics; never parsed.
async fn pump_stderr<R: AsyncRead + Unpin>(stderr: R) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim_end();
                if !line.is_empty() {
                    warn!(target: "watcher", "{line}");
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "watcher stderr read failed");
                break;
            }
        }
    }
}
