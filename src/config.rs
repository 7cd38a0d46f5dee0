//! Runtime configuration, from flags or environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use crate::error::{Error, Result};
use crate::pipeline::{Limits, Pipeline};
use crate::sandbox::DockerCli;
use crate::toolchain::{Language, Registry};
use crate::workspace::WorkspaceManager;

#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "5000", global = true)]
    pub port: u16,

    /// Address to bind
    #[arg(
        long,
        env = "CODERUN_HOST",
        default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        global = true
    )]
    pub host: IpAddr,

    /// Directory that holds per-request workspaces
    #[arg(long, env = "CODERUN_WORKSPACE_ROOT", default_value = "temp", global = true)]
    pub workspace_root: PathBuf,

    /// Run time limit in seconds
    #[arg(long, env = "CODERUN_TIME_LIMIT", default_value = "5", global = true)]
    pub time_limit: u64,

    /// Compile time limit in seconds
    #[arg(long, env = "CODERUN_COMPILE_TIME_LIMIT", default_value = "30", global = true)]
    pub compile_time_limit: u64,

    /// Container engine client binary
    #[arg(long, env = "CODERUN_DOCKER", default_value = "docker", global = true)]
    pub docker: String,

    /// Bytes of stdout and of stderr kept per container run
    #[arg(long, env = "CODERUN_OUTPUT_LIMIT", default_value = "1048576", global = true)]
    pub output_limit: usize,

    /// Image override for cpp
    #[arg(long, env = "CODERUN_CPP_IMAGE", global = true)]
    pub cpp_image: Option<String>,

    /// Image override for java
    #[arg(long, env = "CODERUN_JAVA_IMAGE", global = true)]
    pub java_image: Option<String>,

    /// Image override for python
    #[arg(long, env = "CODERUN_PYTHON_IMAGE", global = true)]
    pub python_image: Option<String>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.time_limit == 0 {
            return Err(Error::Config("time limit must be at least 1 second".into()));
        }
        if self.compile_time_limit == 0 {
            return Err(Error::Config("compile time limit must be at least 1 second".into()));
        }
        if self.output_limit == 0 {
            return Err(Error::Config("output limit must be at least 1 byte".into()));
        }
        if self.docker.trim().is_empty() {
            return Err(Error::Config("container engine binary must not be empty".into()));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            run: Duration::from_secs(self.time_limit),
            compile: Duration::from_secs(self.compile_time_limit),
        }
    }

    pub fn registry(&self) -> Registry {
        let overrides = [
            (Language::Cpp, &self.cpp_image),
            (Language::Java, &self.java_image),
            (Language::Python, &self.python_image),
        ];
        overrides
            .into_iter()
            .fold(Registry::with_defaults(), |registry, (language, image)| match image {
                Some(image) => registry.with_image(language, image.clone()),
                None => registry,
            })
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            Arc::new(DockerCli::new(self.docker.clone()).with_output_limit(self.output_limit)),
            WorkspaceManager::new(&self.workspace_root),
            self.limits(),
        )
    }
}
