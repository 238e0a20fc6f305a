// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-text embedding engine over llama.cpp
//!
//! Lifecycle: `init(model_path) -> handle`, any number of `embed(handle, text)`
//! calls, then `release(handle)`. Each embed call tokenizes (truncating to the
//! context window), clears the context memory, decodes one sequence, takes the
//! last-token pooled embedding and L2-normalizes a copy of it.
pub mod backend;
pub mod batch;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod handle;
pub mod normalize;
pub mod runtime;
pub mod session;
pub mod tokenizer;

pub use config::{EngineConfig, PoolingMode};
pub use engine::EmbeddingEngine;
pub use error::{EngineError, Result};
pub use handle::EngineHandle;
pub use normalize::{cosine_similarity, normalize_l2};
pub use runtime::{InferenceContext, InferenceRuntime, LlamaRuntime};
pub use session::{EmbeddingSession, SessionInfo};
pub use tokenizer::{TokenId, Vocabulary};

/// Install a stderr `tracing` subscriber; a no-op when one is already set.
pub fn init_tracing(level: tracing::Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
