//! coderun - sandboxed multi-language code execution service.
//!
//! A request names a language, carries a source snippet and optional stdin.
//! The snippet is written into a fresh workspace, compiled (if the toolchain
//! has a compile step) and run inside a throwaway container under a
//! wall-clock limit, and the classified result is returned over HTTP.

#[cfg(not(unix))]
compile_error!("coderun only builds on Unix hosts.");

pub mod config;
pub mod error;
pub mod http_server;
pub mod pipeline;
pub mod sandbox;
pub mod state;
pub mod toolchain;
pub mod workspace;

pub use error::{Error, Result};
pub use pipeline::{ExecutionOutcome, Limits, Pipeline};
pub use sandbox::{ContainerEngine, DockerCli, RunConfig, RunResult};
pub use state::AppState;
pub use toolchain::{Language, Registry, Steps, ToolchainSpec};
pub use workspace::{Workspace, WorkspaceManager};
