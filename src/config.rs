//! Layered runtime configuration: built-in defaults, overridden by an
//! optional `ragflux.yaml`/`ragflux.toml`, overridden by `RAGFLUX_*`
//! environment variables — the same layering shape the teacher's `config`
//! crate dependency is meant for.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::ChunkingOptions;
use crate::error::{PipelineError, PipelineResult};

/// Process-wide settings that aren't per-call [`ChunkingOptions`]: cache
/// location and budget, channel back-pressure capacity, batch concurrency,
/// and the memory-pressure threshold that steers the selector toward the
/// memory-optimised strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub cache_dir: Option<PathBuf>,
    pub cache_budget_bytes: u64,
    pub channel_capacity: usize,
    pub max_concurrent_files: usize,
    pub intermediate_yield_size: usize,
    pub memory_pressure_threshold_bytes: u64,
    pub default_chunking: ChunkingOptions,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            cache_budget_bytes: 256 * 1024 * 1024,
            channel_capacity: 64,
            max_concurrent_files: num_cpus::get(),
            intermediate_yield_size: 16,
            memory_pressure_threshold_bytes: 500 * 1024 * 1024,
            default_chunking: ChunkingOptions::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load defaults, then layer `ragflux.{yaml,toml}` if present in the
    /// current directory, then `RAGFLUX_*` environment variables.
    pub fn load() -> PipelineResult<Self> {
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("ragflux").required(false))
            .add_source(config::Environment::with_prefix("RAGFLUX").separator("__"));

        let built = builder
            .build()
            .map_err(|e| PipelineError::InvalidInput(format!("config error: {e}")))?;

        // `config` happily deserializes into our struct because every field
        // has a corresponding default; missing keys fall back via serde's
        // `Deserialize` derive only if marked, so we merge onto defaults by
        // hand instead of relying on partial deserialization.
        let defaults = RuntimeConfig::default();
        match built.try_deserialize::<PartialRuntimeConfig>() {
            Ok(partial) => Ok(partial.merge_onto(defaults)),
            Err(_) => Ok(defaults),
        }
    }
}

/// Mirrors [`RuntimeConfig`] with every field optional, for merge-over-defaults
/// deserialization from layered sources.
#[derive(Debug, Default, Deserialize)]
struct PartialRuntimeConfig {
    cache_dir: Option<PathBuf>,
    cache_budget_bytes: Option<u64>,
    channel_capacity: Option<usize>,
    max_concurrent_files: Option<usize>,
    intermediate_yield_size: Option<usize>,
    memory_pressure_threshold_bytes: Option<u64>,
}

impl PartialRuntimeConfig {
    fn merge_onto(self, mut base: RuntimeConfig) -> RuntimeConfig {
        if let Some(v) = self.cache_dir {
            base.cache_dir = Some(v);
        }
        if let Some(v) = self.cache_budget_bytes {
            base.cache_budget_bytes = v;
        }
        if let Some(v) = self.channel_capacity {
            base.channel_capacity = v;
        }
        if let Some(v) = self.max_concurrent_files {
            base.max_concurrent_files = v;
        }
        if let Some(v) = self.intermediate_yield_size {
            base.intermediate_yield_size = v;
        }
        if let Some(v) = self.memory_pressure_threshold_bytes {
            base.memory_pressure_threshold_bytes = v;
        }
        base
    }
}
