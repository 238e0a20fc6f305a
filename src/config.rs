// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Engine configuration
//!
//! The defaults are the compiled-in reference configuration: CPU only,
//! memory-mapped weights, last-token pooling and a 4096 token window that is
//! simultaneously the context, batch and micro-batch size.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Context length, batch size and maximum input length of the reference configuration
pub const DEFAULT_CONTEXT_SIZE: u32 = 4096;

/// How the runtime reduces per-token hidden states to one sequence vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolingMode {
    /// Hidden state of the final position
    Last,
    Mean,
    Cls,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub context_size: u32,
    pub n_gpu_layers: u32,
    pub use_mmap: bool,
    pub use_mlock: bool,
    pub pooling: PoolingMode,
    pub n_seq_max: u32,
    /// `None` means detected hardware concurrency
    pub threads: Option<usize>,
    pub kv_unified: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_size: DEFAULT_CONTEXT_SIZE,
            n_gpu_layers: 0,
            use_mmap: true,
            use_mlock: false,
            pooling: PoolingMode::Last,
            n_seq_max: 1,
            threads: None,
            kv_unified: true,
        }
    }
}

/// Parameters used to load model weights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelParams {
    pub n_gpu_layers: u32,
    pub use_mmap: bool,
    pub use_mlock: bool,
}

/// Parameters used to construct the inference context bound to a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextParams {
    pub n_ctx: u32,
    pub n_batch: u32,
    pub n_ubatch: u32,
    pub n_seq_max: u32,
    pub n_threads: i32,
    pub n_threads_batch: i32,
    pub embeddings: bool,
    pub pooling: PoolingMode,
    pub kv_unified: bool,
}

impl EngineConfig {
    /// Reference configuration with optional environment overrides
    ///
    /// - `EMBED_CONTEXT_SIZE`: context/batch size in tokens
    /// - `EMBED_THREADS`: decode threads
    ///
    /// Values that do not parse are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(size) = std::env::var("EMBED_CONTEXT_SIZE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            config.context_size = size;
        }
        config.threads = std::env::var("EMBED_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .or(config.threads);
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.context_size == 0 {
            return Err(EngineError::InvalidConfig(
                "context_size must be greater than 0".to_string(),
            ));
        }
        if self.n_seq_max == 0 {
            return Err(EngineError::InvalidConfig(
                "n_seq_max must be greater than 0".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(EngineError::InvalidConfig(
                "threads must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Decode thread count: configured value or detected hardware concurrency, at least 1
    pub fn resolved_threads(&self) -> usize {
        self.threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .unwrap_or(1)
            })
            .max(1)
    }

    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            n_gpu_layers: self.n_gpu_layers,
            use_mmap: self.use_mmap,
            use_mlock: self.use_mlock,
        }
    }

    pub fn context_params(&self) -> ContextParams {
        let threads = i32::try_from(self.resolved_threads()).unwrap_or(i32::MAX);
        ContextParams {
            n_ctx: self.context_size,
            n_batch: self.context_size,
            n_ubatch: self.context_size,
            n_seq_max: self.n_seq_max,
            n_threads: threads,
            n_threads_batch: threads,
            embeddings: true,
            pooling: self.pooling,
            kv_unified: self.kv_unified,
        }
    }
}
