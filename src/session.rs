// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Embedding session
//!
//! One session owns one model and the single inference context bound to it.
//! `embed` calls on a session are serialized by the session mutex; calls on
//! different sessions run independently. Dropping the session releases the
//! context and then the model.

use crate::batch::{SequenceBatch, SEQUENCE_ID};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::normalize::normalize_l2;
use crate::runtime::{InferenceContext, InferenceRuntime};
use crate::tokenizer::tokenize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info};

/// Fixed facts about a constructed session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub n_embd: usize,
    pub n_ctx: usize,
    /// Input limit in tokens: the smaller of `n_ctx` and the decode batch size
    pub max_tokens: usize,
    pub model_path: PathBuf,
}

pub struct EmbeddingSession<C: InferenceContext> {
    context: Mutex<C>,
    info: SessionInfo,
}

impl<C: InferenceContext> std::fmt::Debug for EmbeddingSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingSession")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl<C: InferenceContext> EmbeddingSession<C> {
    /// Load the model at `model_path` and bind a fresh embedding context to it.
    ///
    /// Nothing is retained on failure: a model that loaded but whose context
    /// could not be created is released before the error is returned.
    pub fn create<R>(runtime: &R, model_path: &Path, config: &EngineConfig) -> Result<Self>
    where
        R: InferenceRuntime<Context = C>,
    {
        if model_path.as_os_str().is_empty() {
            error!("Model path is empty");
            return Err(EngineError::EmptyModelPath);
        }
        config.validate()?;

        runtime.ensure_backend()?;

        // the runtime logs load and context failures where it detects them
        let model = runtime.load_model(model_path, &config.model_params())?;
        let mut context = runtime.new_context(model, &config.context_params())?;

        context.enable_embeddings()?;

        let info = SessionInfo {
            n_embd: context.n_embd(),
            n_ctx: context.n_ctx(),
            max_tokens: context.n_ctx().min(context.n_batch()),
            model_path: model_path.to_path_buf(),
        };
        info!(
            "Embedding session created: model={}, n_embd={}, n_ctx={}, max_tokens={}",
            model_path.display(),
            info.n_embd,
            info.n_ctx,
            info.max_tokens
        );

        Ok(Self {
            context: Mutex::new(context),
            info,
        })
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn n_embd(&self) -> usize {
        self.info.n_embd
    }

    pub fn n_ctx(&self) -> usize {
        self.info.n_ctx
    }

    /// Embed one text into an L2-normalized vector of `n_embd` floats.
    ///
    /// Input longer than `max_tokens` tokens is truncated. The returned vector is a
    /// fresh copy owned by the caller.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // Every call clears context memory before decoding, so a panic in an
        // earlier call cannot leave state that affects this one.
        let mut context = self
            .context
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let max_tokens = self.info.max_tokens;
        let mut tokens = tokenize(context.vocabulary(), text, max_tokens)?;
        if tokens.is_empty() {
            error!("Tokenization produced empty tokens");
            return Err(EngineError::EmptyTokens);
        }
        if tokens.len() > max_tokens {
            tokens.truncate(max_tokens);
        }
        debug!("Embedding {} tokens", tokens.len());

        context.clear_memory();

        let batch = SequenceBatch::from_tokens(&tokens);
        if let Err(e) = context.decode(&batch) {
            error!("Decode failed: {}", e);
            return Err(e);
        }

        let pooled = context.sequence_embedding(SEQUENCE_ID).map_err(|e| {
            error!("Failed to get embeddings: {}", e);
            e
        })?;
        if pooled.len() < self.info.n_embd {
            error!(
                "Failed to get embeddings: expected {} floats, got {}",
                self.info.n_embd,
                pooled.len()
            );
            return Err(EngineError::DimensionMismatch {
                expected: self.info.n_embd,
                actual: pooled.len(),
            });
        }

        let mut output = Vec::new();
        output
            .try_reserve_exact(self.info.n_embd)
            .map_err(|_| {
                error!("Failed to allocate float array");
                EngineError::Allocation(self.info.n_embd)
            })?;
        output.extend_from_slice(&pooled[..self.info.n_embd]);
        drop(context);

        normalize_l2(&mut output);
        Ok(output)
    }
}

impl<C: InferenceContext> Drop for EmbeddingSession<C> {
    fn drop(&mut self) {
        info!(
            "Releasing embedding session: model={}",
            self.info.model_path.display()
        );
    }
}
