// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod embed;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Fabstir embedding engine CLI
#[derive(Parser, Debug)]
#[command(name = "fabstir-embed")]
#[command(version)]
#[command(about = "Embed text with a local GGUF model", long_about = None)]
pub struct Cli {
    /// Log pipeline steps at DEBUG level
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the normalized embedding of one text as JSON
    Embed(embed::EmbedArgs),

    /// Print the cosine similarity of two texts
    Similarity(embed::SimilarityArgs),

    /// Print the embedding width and realized context length of a model
    Info(embed::InfoArgs),
}

/// Load `.env` if present, then parse the command line.
///
/// The file is read first so env-backed flags such as `--model`
/// (`EMBED_MODEL_PATH`) can be satisfied from it.
pub fn parse_args() -> Cli {
    dotenv::dotenv().ok();
    Cli::parse()
}

/// Execute CLI command
pub fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Embed(args) => embed::embed_text(args),
        Commands::Similarity(args) => embed::similarity(args),
        Commands::Info(args) => embed::model_info(args),
    }
}
