//! Interpreter process runner.
//!
//! Spawns one interpreter process per call with the composed script passed
//! by path. Both output streams are collected fully in memory. The child is
//! started with `kill_on_drop(true)` and, on unix, in its own process group
//! so that a deadline kill also reaches anything the snippet forked.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::InterpreterConfig;
use crate::{AppError, Result};

/// Raw result of one interpreter invocation that finished before its deadline.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
    /// Process exit status.
    pub status: ExitStatus,
}

impl RunOutput {
    /// Whether the interpreter exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Launches the configured interpreter against a script file.
#[derive(Debug, Clone)]
pub struct Runner {
    program: String,
    args: Vec<String>,
}

impl Runner {
    /// Build a runner from interpreter settings.
    #[must_use]
    pub fn new(config: &InterpreterConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }

    /// Interpreter binary this runner invokes.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run `script` with `workdir` as the current directory, bounded by `deadline`.
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`RunOutput::stderr`] to decide whether user code failed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Timeout` if the deadline elapses (the process is
    /// killed and any partial output is discarded), or `AppError::Runner`
    /// if the process cannot be spawned or its output cannot be collected.
    pub async fn run(&self, script: &Path, workdir: &Path, deadline: Instant) -> Result<RunOutput> {
        if Instant::now() >= deadline {
            return Err(AppError::Timeout("deadline elapsed before start".into()));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(script)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|err| {
            AppError::Runner(format!("failed to spawn {}: {err}", self.program))
        })?;
        let pid = child.id();
        let started = Instant::now();

        match tokio::time::timeout_at(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                debug!(
                    pid,
                    exit_code = output.status.code(),
                    elapsed_ms = elapsed_ms(started),
                    "interpreter exited"
                );
                Ok(RunOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    status: output.status,
                })
            }
            Ok(Err(err)) => Err(AppError::Runner(format!(
                "failed to collect interpreter output: {err}"
            ))),
            Err(_) => {
                // The child handle went down with the timed-out future, which
                // kills the leader; the group kill catches its descendants.
                kill_process_group(pid);
                let elapsed = elapsed_ms(started);
                warn!(pid, elapsed_ms = elapsed, "interpreter killed at deadline");
                Err(AppError::Timeout(format!(
                    "execution exceeded deadline after {elapsed} ms"
                )))
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(err) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        debug!(pgid, %err, "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
