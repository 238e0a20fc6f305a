// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the embedding engine
//!
//! Every failure the engine can report, grouped as:
//! - Invalid input (null/empty arguments, stale handles)
//! - Resource acquisition (backend, model load, context construction)
//! - Pipeline failures (tokenization, decode, embedding extraction, allocation)
//!
//! None of these cross the C ABI: the boundary turns them into a null result
//! plus the log line emitted where the failure was detected.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while creating, using or releasing an embedding session
#[derive(Error, Debug)]
pub enum EngineError {
    /// A pointer argument at the C boundary was null
    #[error("{0} is null")]
    NullArgument(&'static str),

    /// A string argument at the C boundary was not valid UTF-8
    #[error("{argument} is not valid UTF-8")]
    InvalidUtf8 { argument: &'static str },

    /// Session construction was asked to load an empty path
    #[error("Model path is empty")]
    EmptyModelPath,

    /// Handle is zero, was never issued, or has already been released
    #[error("Embedding handle {0:#x} is invalid")]
    InvalidHandle(u64),

    /// One-time runtime initialization failed
    #[error("Failed to initialize backend: {0}")]
    BackendInit(String),

    /// Model weights could not be loaded
    #[error("Failed to load model from {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    /// Inference context could not be constructed for a loaded model
    #[error("Failed to init context: {0}")]
    ContextInit(String),

    /// The vocabulary rejected the input text
    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    /// Tokenization produced no tokens
    #[error("Tokenization produced empty tokens")]
    EmptyTokens,

    /// A token could not be placed in the decode batch
    #[error("Failed to build decode batch: {0}")]
    Batch(String),

    /// The decode step returned a non-zero status
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The context produced no pooled embedding for the sequence
    #[error("Failed to get embeddings: {0}")]
    MissingEmbeddings(String),

    /// Pooled embedding is shorter than the model's embedding width
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The host-owned output buffer could not be allocated
    #[error("Failed to allocate output vector of {0} floats")]
    Allocation(usize),

    /// Engine configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A panic was caught at the C boundary
    #[error("Panic in {0}")]
    Panic(&'static str),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
