// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use fabstir_embed_engine::cli::{execute, parse_args};

fn main() -> Result<()> {
    let cli = parse_args();

    // Logs go to stderr so stdout stays valid JSON
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    fabstir_embed_engine::init_tracing(level);

    match execute(cli) {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
