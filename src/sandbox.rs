//! Container launcher.
//!
//! Runs one shell command line in a throwaway container whose `/app` is the
//! request workspace. The time limit is enforced inside the container with
//! `timeout`, so killing the host-side client is never what stops a program.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Where the workspace is mounted inside the container.
pub const MOUNT_POINT: &str = "/app";

/// Exit status of `timeout(1)` when it had to kill the command.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit status `docker run` uses for failures of the engine itself.
pub const DOCKER_ERROR_EXIT_CODE: i32 = 125;

/// What a program's own exit status 125 is rewritten to inside the container,
/// so that 125 on the host always means the engine failed. Translated back
/// before the result leaves the launcher.
pub const ALIASED_EXIT_CODE: i32 = 225;

/// Shell status of a process killed by SIGKILL. `timeout -k` ends with this
/// instead of 124 when it had to escalate.
pub const KILLED_EXIT_CODE: i32 = 137;

/// Appended to a captured stream that hit the output limit.
pub const TRUNCATION_MARKER: &str = "\n[output truncated]\n";

/// Configuration for one container invocation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub image: String,
    /// Shell command line, run with `sh -c` in [`MOUNT_POINT`].
    pub command: String,
    /// Host directory bound at [`MOUNT_POINT`].
    pub workspace: PathBuf,
    /// `None` leaves the container without an attached stdin.
    pub stdin: Option<String>,
    pub time_limit: Duration,
}

/// Result of running a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` if the client process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == Some(TIMEOUT_EXIT_CODE)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Something that can run a [`RunConfig`] to completion.
///
/// `Err` means the container could not be launched at all. Any exit status of
/// the program itself, including a timeout, is an `Ok`.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn run(&self, config: &RunConfig) -> Result<RunResult>;
}

/// [`ContainerEngine`] backed by the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    /// Extra host-side wait past the time limit before the container is
    /// removed by force.
    grace: Duration,
    /// Bytes kept per stream; the rest is drained and dropped.
    output_limit: usize,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            grace: Duration::from_secs(5),
            output_limit: 1024 * 1024,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn with_output_limit(mut self, output_limit: usize) -> Self {
        self.output_limit = output_limit;
        self
    }

    /// Arguments passed to the client for `config`, container named `name`.
    pub fn run_args(&self, config: &RunConfig, name: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            name.to_string(),
            "--network".to_string(),
            "none".to_string(),
            "-v".to_string(),
            format!("{}:{}", config.workspace.display(), MOUNT_POINT),
            "-w".to_string(),
            MOUNT_POINT.to_string(),
        ];
        if config.stdin.is_some() {
            args.push("-i".to_string());
        }
        args.push(config.image.clone());
        args.push("sh".to_string());
        args.push("-c".to_string());
        args.push(wrap_with_timeout(&config.command, config.time_limit));
        args
    }

    async fn force_remove(&self, name: &str) {
        let status = Command::new(&self.binary)
            .args(["rm", "-f", name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match status {
            Ok(s) if s.success() => debug!(container = %name, "Container removed"),
            Ok(s) => warn!(container = %name, status = ?s.code(), "Container removal failed"),
            Err(e) => warn!(container = %name, error = %e, "Container removal failed"),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn run(&self, config: &RunConfig) -> Result<RunResult> {
        let name = format!("coderun-{}", Uuid::new_v4());
        let args = self.run_args(config, &name);
        info!(
            image = %config.image,
            command = %config.command,
            container = %name,
            "Launching container"
        );

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(if config.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Launch(format!("failed to start {}: {}", self.binary, e)))?;

        // Feed stdin from a separate task so a program that writes a lot
        // before reading cannot deadlock against us. Dropping the pipe closes it.
        let writer = match (child.stdin.take(), config.stdin.clone()) {
            (Some(mut pipe), Some(data)) => Some(tokio::spawn(async move {
                if let Err(e) = pipe.write_all(data.as_bytes()).await {
                    debug!(error = %e, "stdin closed before all input was written");
                }
            })),
            _ => None,
        };

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => return Err(Error::Launch("container output was not captured".to_string())),
        };

        let started = Instant::now();
        let deadline = config.time_limit + self.grace;
        let limit = self.output_limit;
        let collected = tokio::time::timeout(deadline, async {
            tokio::try_join!(
                read_capped(stdout, limit),
                read_capped(stderr, limit),
                child.wait()
            )
        })
        .await;

        let (stdout, stderr, status) = match collected {
            Ok(result) => {
                result.map_err(|e| Error::Launch(format!("waiting for container: {e}")))?
            }
            Err(_) => {
                warn!(
                    container = %name,
                    ?deadline,
                    "In-container timeout never fired; removing container"
                );
                let _ = child.start_kill();
                self.force_remove(&name).await;
                return Ok(RunResult {
                    exit_code: Some(TIMEOUT_EXIT_CODE),
                    ..RunResult::default()
                });
            }
        };
        if let Some(writer) = writer {
            let _ = writer.await;
        }

        let exit_code = status.code();
        debug!(
            container = %name,
            ?exit_code,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Container exited"
        );

        if exit_code == Some(DOCKER_ERROR_EXIT_CODE) {
            let message = String::from_utf8_lossy(&stderr).trim().to_string();
            return Err(Error::Launch(message));
        }

        let elapsed = started.elapsed();
        Ok(RunResult {
            stdout,
            stderr,
            exit_code: exit_code.map(|code| program_exit_code(code, elapsed, config.time_limit)),
        })
    }
}

/// Undo the in-container rewrites so the result carries what the program did.
fn program_exit_code(code: i32, elapsed: Duration, limit: Duration) -> i32 {
    match code {
        ALIASED_EXIT_CODE => DOCKER_ERROR_EXIT_CODE,
        // SIGKILL after the limit is `timeout -k` escalating, not the program.
        KILLED_EXIT_CODE if elapsed >= limit => TIMEOUT_EXIT_CODE,
        other => other,
    }
}

/// Read `reader` to EOF, keeping at most `limit` bytes.
async fn read_capped<R>(mut reader: R, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len());
        if n > room {
            truncated = true;
        }
        kept.extend_from_slice(&chunk[..n.min(room)]);
    }
    if truncated {
        kept.extend_from_slice(TRUNCATION_MARKER.as_bytes());
    }
    Ok(kept)
}

fn wrap_with_timeout(command: &str, limit: Duration) -> String {
    let secs = limit.as_secs().max(1);
    format!(
        "timeout -k 1s {secs}s {command}; rc=$?; \
         [ $rc -eq {DOCKER_ERROR_EXIT_CODE} ] && rc={ALIASED_EXIT_CODE}; exit $rc"
    )
}
