//! Compile → run orchestration for a single request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::Result;
use crate::sandbox::{ContainerEngine, RunConfig, RunResult};
use crate::toolchain::ToolchainSpec;
use crate::workspace::{Workspace, WorkspaceManager};

/// Terminal state of one execution. Exactly one is produced per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success { output: String },
    CompileFailure { diagnostic: String },
    RuntimeFailure { stderr: String },
    TimeLimitExceeded { limit: Duration },
    /// The container engine could not start the step. Not the program's fault.
    LaunchFailure { message: String },
}

impl ExecutionOutcome {
    /// Text shown to the caller for a failed program.
    pub fn error_message(&self) -> Option<String> {
        match self {
            ExecutionOutcome::Success { .. } => None,
            ExecutionOutcome::CompileFailure { diagnostic } => Some(diagnostic.clone()),
            ExecutionOutcome::RuntimeFailure { stderr } => Some(stderr.clone()),
            ExecutionOutcome::TimeLimitExceeded { limit } => Some(format!(
                "Time Limit Exceeded (TLE). Your code took longer than {} seconds to run.",
                limit.as_secs()
            )),
            ExecutionOutcome::LaunchFailure { message } => Some(message.clone()),
        }
    }
}

/// Wall-clock bounds for the two stages.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub run: Duration,
    pub compile: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            run: Duration::from_secs(5),
            compile: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    engine: Arc<dyn ContainerEngine>,
    workspaces: WorkspaceManager,
    limits: Limits,
}

impl Pipeline {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        workspaces: WorkspaceManager,
        limits: Limits,
    ) -> Self {
        Self {
            engine,
            workspaces,
            limits,
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Run `code` with `toolchain` in a fresh workspace.
    ///
    /// `Err` is reserved for workspace I/O faults; everything the program or
    /// the container engine does ends up in the returned outcome. The
    /// workspace is released before this returns, or on drop if cancelled.
    pub async fn execute(
        &self,
        toolchain: &ToolchainSpec,
        code: &str,
        stdin: &str,
    ) -> Result<ExecutionOutcome> {
        let started = Instant::now();
        let mut workspace = self.workspaces.create().await?;
        let id = workspace.id();

        let outcome = self.run_stages(&mut workspace, toolchain, code, stdin).await;
        workspace.destroy().await;

        match &outcome {
            Ok(result) => info!(
                workspace = %id,
                language = %toolchain.language,
                outcome = outcome_name(result),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Execution finished"
            ),
            Err(e) => warn!(
                workspace = %id,
                language = %toolchain.language,
                error = %e,
                "Execution aborted"
            ),
        }
        outcome
    }

    async fn run_stages(
        &self,
        workspace: &mut Workspace,
        toolchain: &ToolchainSpec,
        code: &str,
        stdin: &str,
    ) -> Result<ExecutionOutcome> {
        workspace.write_source(&toolchain.source_filename, code).await?;

        if let Some(compile) = toolchain.compile_command() {
            info!(workspace = %workspace.id(), language = %toolchain.language, "Compiling");
            let config = RunConfig {
                image: toolchain.image.clone(),
                command: compile.to_string(),
                workspace: workspace.path().to_path_buf(),
                stdin: None,
                time_limit: self.limits.compile,
            };
            let result = match self.engine.run(&config).await {
                Ok(result) => result,
                Err(e) => return Ok(ExecutionOutcome::LaunchFailure { message: e.to_string() }),
            };
            if let Some(failure) = classify_compile(&result, self.limits.compile) {
                return Ok(failure);
            }
        }

        info!(workspace = %workspace.id(), language = %toolchain.language, "Running");
        let config = RunConfig {
            image: toolchain.image.clone(),
            command: toolchain.run_command().to_string(),
            workspace: workspace.path().to_path_buf(),
            stdin: Some(stdin.to_string()),
            time_limit: self.limits.run,
        };
        match self.engine.run(&config).await {
            Ok(result) => Ok(classify_run(result, self.limits.run)),
            Err(e) => Ok(ExecutionOutcome::LaunchFailure { message: e.to_string() }),
        }
    }
}

/// `None` when compilation succeeded and the run stage should follow.
pub fn classify_compile(result: &RunResult, limit: Duration) -> Option<ExecutionOutcome> {
    if result.success() {
        return None;
    }
    let diagnostic = if result.timed_out() {
        format!("Compilation timed out after {} seconds.", limit.as_secs())
    } else {
        diagnostic_or_exit_code(result, "Compilation failed")
    };
    Some(ExecutionOutcome::CompileFailure { diagnostic })
}

pub fn classify_run(result: RunResult, limit: Duration) -> ExecutionOutcome {
    if result.timed_out() {
        ExecutionOutcome::TimeLimitExceeded { limit }
    } else if result.success() {
        ExecutionOutcome::Success {
            output: result.stdout_lossy(),
        }
    } else {
        ExecutionOutcome::RuntimeFailure {
            stderr: diagnostic_or_exit_code(&result, "Program exited"),
        }
    }
}

fn diagnostic_or_exit_code(result: &RunResult, what: &str) -> String {
    let stderr = result.stderr_lossy();
    if !stderr.trim().is_empty() {
        return stderr;
    }
    match result.exit_code {
        Some(code) => format!("{what} with exit code {code}."),
        None => format!("{what}: terminated by a signal."),
    }
}

fn outcome_name(outcome: &ExecutionOutcome) -> &'static str {
    match outcome {
        ExecutionOutcome::Success { .. } => "success",
        ExecutionOutcome::CompileFailure { .. } => "compile_failure",
        ExecutionOutcome::RuntimeFailure { .. } => "runtime_failure",
        ExecutionOutcome::TimeLimitExceeded { .. } => "time_limit_exceeded",
        ExecutionOutcome::LaunchFailure { .. } => "launch_failure",
    }
}
