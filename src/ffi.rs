// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! C ABI boundary
//!
//! Hosts drive the engine through five functions:
//!
//! ```c
//! uint64_t embed_engine_init(const char *model_path);           // 0 on failure
//! float   *embed_engine_embed(uint64_t handle, const char *text,
//!                             size_t *out_len);                  // NULL on failure
//! void     embed_engine_free_vector(float *ptr, size_t len);
//! size_t   embed_engine_dimension(uint64_t handle);              // 0 on failure
//! void     embed_engine_release(uint64_t handle);                // 0 is a no-op
//! ```
//!
//! Strings are borrowed for the duration of the call only. Vectors are handed
//! over as heap buffers the host returns with `embed_engine_free_vector`.
//! Errors never cross the boundary: they become the failure value above plus a
//! log line, and panics are caught here.

use crate::config::EngineConfig;
use crate::engine::EmbeddingEngine;
use crate::error::{EngineError, Result};
use crate::handle::EngineHandle;
use crate::runtime::{InferenceRuntime, LlamaRuntime};
use std::ffi::{c_char, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;
use tracing::error;

static ENGINE: OnceLock<EmbeddingEngine<LlamaRuntime>> = OnceLock::new();

fn global_engine() -> &'static EmbeddingEngine<LlamaRuntime> {
    ENGINE.get_or_init(|| EmbeddingEngine::new(LlamaRuntime, EngineConfig::default()))
}

/// Borrow a host string for the duration of one call.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// and unmodified until the call returns.
unsafe fn borrow_str<'a>(ptr: *const c_char, argument: &'static str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(EngineError::NullArgument(argument));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| EngineError::InvalidUtf8 { argument })
}

fn guarded<T>(operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| Err(EngineError::Panic(operation)))
}

/// Marshaling for `embed_engine_init` against any engine
///
/// # Safety
/// See [`borrow_str`] for `model_path`.
pub unsafe fn init_with<R: InferenceRuntime>(
    engine: &EmbeddingEngine<R>,
    model_path: *const c_char,
) -> u64 {
    let result = guarded("init", || {
        let path = borrow_str(model_path, "Model path")?;
        engine.init(path)
    });
    match result {
        Ok(handle) => handle.into_raw(),
        Err(e) => {
            error!("init failed: {}", e);
            0
        }
    }
}

/// Argument checks in order: handle, then session, then output length, then text.
///
/// # Safety
/// See [`embed_with`].
unsafe fn embed_checked<R: InferenceRuntime>(
    engine: &EmbeddingEngine<R>,
    handle: u64,
    text: *const c_char,
    out_len: *mut usize,
) -> Result<Vec<f32>> {
    let handle = EngineHandle::from_raw(handle).ok_or(EngineError::InvalidHandle(0))?;
    let session = engine.session(handle)?;
    if out_len.is_null() {
        return Err(EngineError::NullArgument("Output length"));
    }
    let text = borrow_str(text, "Embedding text")?;
    session.embed(text)
}

/// Marshaling for `embed_engine_embed` against any engine
///
/// # Safety
/// See [`borrow_str`] for `text`; `out_len` must be null or valid for writes.
pub unsafe fn embed_with<R: InferenceRuntime>(
    engine: &EmbeddingEngine<R>,
    handle: u64,
    text: *const c_char,
    out_len: *mut usize,
) -> *mut f32 {
    let result = guarded("embed", || embed_checked(engine, handle, text, out_len));
    match result {
        Ok(vector) => {
            let boxed = vector.into_boxed_slice();
            *out_len = boxed.len();
            Box::into_raw(boxed) as *mut f32
        }
        Err(e) => {
            error!("embed failed: {}", e);
            if !out_len.is_null() {
                *out_len = 0;
            }
            std::ptr::null_mut()
        }
    }
}

/// Marshaling for `embed_engine_dimension` against any engine
pub fn dimension_with<R: InferenceRuntime>(engine: &EmbeddingEngine<R>, handle: u64) -> usize {
    let result = guarded("dimension", || {
        let handle = EngineHandle::from_raw(handle).ok_or(EngineError::InvalidHandle(0))?;
        engine.session_info(handle)
    });
    result.map(|info| info.n_embd).unwrap_or(0)
}

/// Marshaling for `embed_engine_release` against any engine
pub fn release_with<R: InferenceRuntime>(engine: &EmbeddingEngine<R>, handle: u64) {
    let Some(handle) = EngineHandle::from_raw(handle) else {
        return;
    };
    if let Err(e) = guarded("release", || engine.release(handle)) {
        error!("release failed: {}", e);
    }
}

/// Return a vector produced by `embed_engine_embed`.
///
/// # Safety
/// `ptr`/`len` must come from one successful `embed_engine_embed` call and must
/// not be freed twice. A null `ptr` is ignored.
#[no_mangle]
pub unsafe extern "C" fn embed_engine_free_vector(ptr: *mut f32, len: usize) {
    if ptr.is_null() {
        return;
    }
    drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len)));
}

/// # Safety
/// `model_path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn embed_engine_init(model_path: *const c_char) -> u64 {
    init_with(global_engine(), model_path)
}

/// # Safety
/// `text` must be null or a valid NUL-terminated string; `out_len` must be
/// null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn embed_engine_embed(
    handle: u64,
    text: *const c_char,
    out_len: *mut usize,
) -> *mut f32 {
    embed_with(global_engine(), handle, text, out_len)
}

#[no_mangle]
pub extern "C" fn embed_engine_dimension(handle: u64) -> usize {
    dimension_with(global_engine(), handle)
}

#[no_mangle]
pub extern "C" fn embed_engine_release(handle: u64) {
    release_with(global_engine(), handle)
}

/// Install a stderr log subscriber at INFO level. Does nothing if the host
/// already installed one.
#[no_mangle]
pub extern "C" fn embed_engine_init_logging() {
    crate::init_tracing(tracing::Level::INFO);
}
