// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-wide llama.cpp backend
//!
//! The backend is initialized at most once per process and never torn down;
//! every session borrows the same `'static` instance.

use crate::error::{EngineError, Result};
use llama_cpp_2::llama_backend::LlamaBackend;
use std::sync::OnceLock;
use tracing::{error, info};

static BACKEND: OnceLock<std::result::Result<LlamaBackend, String>> = OnceLock::new();

/// Initialize the llama.cpp backend on first call; later calls return the same instance.
///
/// Safe to call from any thread. Concurrent first callers block until the
/// single initialization finishes. A failed initialization is remembered and
/// reported to every caller.
pub fn ensure_backend() -> Result<&'static LlamaBackend> {
    BACKEND
        .get_or_init(|| match LlamaBackend::init() {
            Ok(backend) => {
                info!("llama.cpp backend initialized");
                Ok(backend)
            }
            Err(e) => {
                error!("Failed to initialize backend: {:?}", e);
                Err(format!("{:?}", e))
            }
        })
        .as_ref()
        .map_err(|e| EngineError::BackendInit(e.clone()))
}
