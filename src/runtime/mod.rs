// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inference runtime seam
//!
//! The session drives load -> tokenize -> batch -> decode -> pool through these
//! traits. `LlamaRuntime` is the production implementation.

pub mod llama;

use crate::batch::SequenceBatch;
use crate::config::{ContextParams, ModelParams};
use crate::error::Result;
use crate::tokenizer::Vocabulary;
use std::path::Path;

pub use llama::LlamaRuntime;

/// Loads models and binds inference contexts to them
pub trait InferenceRuntime: Send + Sync {
    /// Loaded weights, read-only after load
    type Model: Send;
    /// A model together with the one context bound to it
    type Context: InferenceContext;

    /// One-time global initialization; idempotent
    fn ensure_backend(&self) -> Result<()>;

    fn load_model(&self, path: &Path, params: &ModelParams) -> Result<Self::Model>;

    /// Bind a new context to `model`, taking ownership of it.
    ///
    /// On failure the model has been released by the time the error is returned.
    fn new_context(&self, model: Self::Model, params: &ContextParams) -> Result<Self::Context>;
}

/// Mutable inference state of one session
///
/// Dropping the context releases it and then the model it owns.
pub trait InferenceContext: Send {
    fn vocabulary(&self) -> &dyn Vocabulary;

    /// Embedding width of the model
    fn n_embd(&self) -> usize;

    /// Realized context length, which may differ from the requested one
    fn n_ctx(&self) -> usize;

    /// Most tokens a single decode call accepts
    fn n_batch(&self) -> usize;

    /// Make sure the context emits embeddings rather than logits only
    fn enable_embeddings(&mut self) -> Result<()>;

    /// Drop all cached sequence state (key/value cache)
    fn clear_memory(&mut self);

    /// Run one forward pass over `batch`
    fn decode(&mut self, batch: &SequenceBatch) -> Result<()>;

    /// Pooled embedding of `seq_id` from the last decode, borrowed from the context
    fn sequence_embedding(&self, seq_id: i32) -> Result<&[f32]>;
}
