//! In-process container engine for tests that must not need docker.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coderun::sandbox::TIMEOUT_EXIT_CODE;
use coderun::{
    AppState, ContainerEngine, Error, Limits, Pipeline, Registry, RunConfig, RunResult,
    WorkspaceManager,
};

/// What the engine saw for one invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub image: String,
    pub command: String,
    pub stdin: Option<String>,
    pub workspace: PathBuf,
    /// Names of the files present in the workspace when the call started.
    pub files: Vec<String>,
}

type Responder = dyn Fn(&RunConfig, &str) -> Result<RunResult, Error> + Send + Sync;

/// Answers each call with a closure given the config and the contents of the
/// workspace's source file.
pub struct ScriptedEngine {
    calls: Mutex<Vec<Call>>,
    delay: Duration,
    respond: Box<Responder>,
}

impl ScriptedEngine {
    pub fn new(
        respond: impl Fn(&RunConfig, &str) -> Result<RunResult, Error> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::with_delay(Duration::ZERO, respond)
    }

    pub fn with_delay(
        delay: Duration,
        respond: impl Fn(&RunConfig, &str) -> Result<RunResult, Error> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            delay,
            respond: Box::new(respond),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerEngine for ScriptedEngine {
    async fn run(&self, config: &RunConfig) -> Result<RunResult, Error> {
        let mut files: Vec<String> = std::fs::read_dir(&config.workspace)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        self.calls.lock().unwrap().push(Call {
            image: config.image.clone(),
            command: config.command.clone(),
            stdin: config.stdin.clone(),
            workspace: config.workspace.clone(),
            files: files.clone(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let source = files
            .first()
            .map(|name| std::fs::read_to_string(config.workspace.join(name)).unwrap())
            .unwrap_or_default();
        (self.respond)(config, &source)
    }
}

pub fn exited(code: i32, stdout: &str, stderr: &str) -> RunResult {
    RunResult {
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
        exit_code: Some(code),
    }
}

pub fn timed_out() -> RunResult {
    exited(TIMEOUT_EXIT_CODE, "", "")
}

pub fn is_compile(config: &RunConfig) -> bool {
    config.stdin.is_none()
}

pub fn pipeline(engine: Arc<ScriptedEngine>, root: &Path) -> Pipeline {
    Pipeline::new(engine, WorkspaceManager::new(root), Limits::default())
}

pub fn app_state(engine: Arc<ScriptedEngine>, root: &Path) -> AppState {
    AppState::new(Registry::with_defaults(), pipeline(engine, root))
}

/// Entries left under the workspace root.
pub fn leftover_workspaces(root: &Path) -> usize {
    match std::fs::read_dir(root) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
