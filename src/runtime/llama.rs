// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! llama.cpp runtime via `llama-cpp-2`
//!
//! The model and its context live in one self-referential cell: the context
//! borrows the model, and dropping the cell drops the context before the model.

use super::{InferenceContext, InferenceRuntime};
use crate::backend::ensure_backend;
use crate::batch::SequenceBatch;
use crate::config::{ContextParams, ModelParams, PoolingMode};
use crate::error::{EngineError, Result};
use crate::tokenizer::{TokenId, Vocabulary};
use llama_cpp_2::{
    context::{
        params::{LlamaContextParams, LlamaPoolingType},
        LlamaContext,
    },
    llama_batch::LlamaBatch,
    model::{params::LlamaModelParams, AddBos, LlamaModel},
    token::LlamaToken,
};
use self_cell::self_cell;
use std::num::NonZeroU32;
use std::path::Path;
use tracing::{debug, error, info, warn};

self_cell! {
    struct ModelCell {
        owner: LlamaModel,
        #[covariant]
        dependent: LlamaContext,
    }
}

fn pooling_type(mode: PoolingMode) -> LlamaPoolingType {
    match mode {
        PoolingMode::Last => LlamaPoolingType::Last,
        PoolingMode::Mean => LlamaPoolingType::Mean,
        PoolingMode::Cls => LlamaPoolingType::Cls,
    }
}

fn llama_model_params(params: &ModelParams) -> LlamaModelParams {
    LlamaModelParams::default()
        .with_n_gpu_layers(params.n_gpu_layers)
        .with_use_mlock(params.use_mlock)
}

impl Vocabulary for LlamaModel {
    fn str_to_tokens(&self, text: &str, add_special: bool) -> Result<Vec<TokenId>> {
        let add_bos = if add_special {
            AddBos::Always
        } else {
            AddBos::Never
        };
        self.str_to_token(text, add_bos)
            .map(|tokens| tokens.into_iter().map(|t| t.0).collect())
            .map_err(|e| EngineError::Tokenization(e.to_string()))
    }
}

/// Stateless handle to the process-wide llama.cpp backend
#[derive(Debug, Clone, Copy, Default)]
pub struct LlamaRuntime;

/// A loaded GGUF model with its bound embedding context
pub struct LlamaSession {
    cell: ModelCell,
    n_embd: usize,
    n_ctx: usize,
    n_batch: usize,
    embeddings_enabled: bool,
}

// SAFETY: `LlamaContext` is !Send only because it holds a raw llama.cpp pointer.
// The session layer keeps every `LlamaSession` behind its own mutex and the type is
// not `Sync`, so the context is only ever used by one thread at a time.
unsafe impl Send for LlamaSession {}

impl InferenceRuntime for LlamaRuntime {
    type Model = LlamaModel;
    type Context = LlamaSession;

    fn ensure_backend(&self) -> Result<()> {
        ensure_backend().map(|_| ())
    }

    fn load_model(&self, path: &Path, params: &ModelParams) -> Result<LlamaModel> {
        let backend = ensure_backend()?;

        if !params.use_mmap {
            warn!("llama-cpp-2 always memory-maps weights; use_mmap=false not applied");
        }
        let model_params = llama_model_params(params);

        LlamaModel::load_from_file(backend, path, &model_params).map_err(|e| {
            error!("Failed to load model {}: {}", path.display(), e);
            EngineError::ModelLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })
    }

    fn new_context(&self, model: LlamaModel, params: &ContextParams) -> Result<LlamaSession> {
        let backend = ensure_backend()?;

        // A single sequence makes the unified and split KV layouts identical
        debug!(
            "Creating context: n_ctx={}, n_batch={}, n_ubatch={}, threads={}, kv_unified={}",
            params.n_ctx, params.n_batch, params.n_ubatch, params.n_threads, params.kv_unified
        );
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(params.n_ctx))
            .with_n_batch(params.n_batch)
            .with_n_ubatch(params.n_ubatch)
            .with_n_seq_max(params.n_seq_max)
            .with_n_threads(params.n_threads)
            .with_n_threads_batch(params.n_threads_batch)
            .with_embeddings(params.embeddings)
            .with_pooling_type(pooling_type(params.pooling));

        let n_embd = usize::try_from(model.n_embd()).unwrap_or(0);

        // `model` moves into the cell; if the context fails the cell drops it.
        let cell = ModelCell::try_new(model, |m| {
            m.new_context(backend, ctx_params).map_err(|e| {
                error!("Failed to init context: {}", e);
                EngineError::ContextInit(e.to_string())
            })
        })?;

        let n_ctx = cell.borrow_dependent().n_ctx() as usize;
        let n_batch = cell.borrow_dependent().n_batch() as usize;
        info!(
            "Context ready: n_embd={}, n_ctx={}, n_batch={}",
            n_embd, n_ctx, n_batch
        );

        Ok(LlamaSession {
            cell,
            n_embd,
            n_ctx,
            n_batch,
            embeddings_enabled: params.embeddings,
        })
    }
}

impl InferenceContext for LlamaSession {
    fn vocabulary(&self) -> &dyn Vocabulary {
        self.cell.borrow_owner()
    }

    fn n_embd(&self) -> usize {
        self.n_embd
    }

    fn n_ctx(&self) -> usize {
        self.n_ctx
    }

    fn n_batch(&self) -> usize {
        self.n_batch
    }

    fn enable_embeddings(&mut self) -> Result<()> {
        // llama-cpp-2 fixes embedding output when the context is created
        if !self.embeddings_enabled {
            return Err(EngineError::ContextInit(
                "context was created without embeddings output".to_string(),
            ));
        }
        Ok(())
    }

    fn clear_memory(&mut self) {
        self.cell.with_dependent_mut(|_, ctx| ctx.clear_kv_cache());
    }

    fn decode(&mut self, batch: &SequenceBatch) -> Result<()> {
        // Freed by Drop on every return path below
        let mut native = LlamaBatch::new(batch.len(), batch.n_seq());
        for entry in batch.entries() {
            native
                .add(
                    LlamaToken(entry.token),
                    entry.pos,
                    &[entry.seq_id],
                    entry.output,
                )
                .map_err(|e| EngineError::Batch(e.to_string()))?;
        }

        self.cell
            .with_dependent_mut(|_, ctx| ctx.decode(&mut native))
            .map_err(|e| EngineError::Decode(e.to_string()))
    }

    fn sequence_embedding(&self, seq_id: i32) -> Result<&[f32]> {
        self.cell
            .borrow_dependent()
            .embeddings_seq_ith(seq_id)
            .map_err(|e| EngineError::MissingEmbeddings(e.to_string()))
    }
}
