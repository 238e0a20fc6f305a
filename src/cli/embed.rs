// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

use crate::config::EngineConfig;
use crate::engine::EmbeddingEngine;
use crate::handle::EngineHandle;
use crate::normalize::cosine_similarity;
use crate::runtime::LlamaRuntime;

/// Model selection shared by every command
#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Path to a GGUF embedding model (can also be set via EMBED_MODEL_PATH env var)
    #[arg(long, env = "EMBED_MODEL_PATH")]
    pub model: PathBuf,
}

/// Arguments for embed command
#[derive(Args, Debug)]
pub struct EmbedArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Text to embed (read from stdin when omitted)
    #[arg(long)]
    pub text: Option<String>,
}

/// Arguments for similarity command
#[derive(Args, Debug)]
pub struct SimilarityArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    pub first: String,

    pub second: String,
}

/// Arguments for info command
#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Serialize)]
struct EmbedOutput<'a> {
    model: &'a str,
    dimension: usize,
    embedding: &'a [f32],
}

#[derive(Serialize)]
struct SimilarityOutput {
    similarity: f32,
}

/// Runs `f` against a freshly created session and always releases it
fn with_session<T>(
    args: &ModelArgs,
    f: impl FnOnce(&EmbeddingEngine<LlamaRuntime>, EngineHandle) -> Result<T>,
) -> Result<T> {
    let engine = EmbeddingEngine::new(LlamaRuntime, EngineConfig::from_env());
    let handle = engine
        .init(&args.model)
        .with_context(|| format!("Failed to create session for {}", args.model.display()))?;

    let result = f(&engine, handle);
    engine.release(handle)?;
    result
}

/// Embed one text and print it as JSON
pub fn embed_text(args: EmbedArgs) -> Result<()> {
    let text = match args.text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read text from stdin")?;
            buffer
        }
    };
    if text.is_empty() {
        return Err(anyhow!("No text to embed. Use --text or pipe it on stdin"));
    }

    with_session(&args.model, |engine, handle| {
        let embedding = engine.embed(handle, &text)?;
        info!("Embedded {} bytes into {} dimensions", text.len(), embedding.len());

        let model = args.model.model.display().to_string();
        let output = EmbedOutput {
            model: &model,
            dimension: embedding.len(),
            embedding: &embedding,
        };
        println!("{}", serde_json::to_string(&output)?);
        Ok(())
    })
}

/// Print the cosine similarity of two texts
pub fn similarity(args: SimilarityArgs) -> Result<()> {
    with_session(&args.model, |engine, handle| {
        let first = engine.embed(handle, &args.first)?;
        let second = engine.embed(handle, &args.second)?;
        let output = SimilarityOutput {
            similarity: cosine_similarity(&first, &second),
        };
        println!("{}", serde_json::to_string(&output)?);
        Ok(())
    })
}

/// Print session facts for a model
pub fn model_info(args: InfoArgs) -> Result<()> {
    with_session(&args.model, |engine, handle| {
        let info = engine.session_info(handle)?;
        println!("{}", serde_json::to_string_pretty(&info)?);
        Ok(())
    })
}
