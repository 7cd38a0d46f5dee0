//! Shared application state.
//!
//! Nothing in here is mutated after startup; requests share it read-only.

use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::toolchain::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(registry: Registry, pipeline: Pipeline) -> Self {
        Self {
            registry: Arc::new(registry),
            pipeline,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.registry(), config.pipeline())
    }
}
