// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Engine facade: init / embed / release over opaque handles

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::handle::{EngineHandle, HandleTable};
use crate::runtime::InferenceRuntime;
use crate::session::{EmbeddingSession, SessionInfo};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{error, info, warn};

/// A live session shared between the table and in-flight calls
pub type SharedSession<R> = Arc<EmbeddingSession<<R as InferenceRuntime>::Context>>;

/// Owns every live embedding session and hands out handles to them
///
/// The session table lock is held only for lookups, inserts and removals;
/// model loading and decoding run outside it. An `embed` that is in flight
/// when its handle is released finishes normally, and the session is torn
/// down when that call returns.
pub struct EmbeddingEngine<R: InferenceRuntime> {
    runtime: R,
    config: EngineConfig,
    sessions: RwLock<HandleTable<SharedSession<R>>>,
}

impl<R: InferenceRuntime> EmbeddingEngine<R> {
    pub fn new(runtime: R, config: EngineConfig) -> Self {
        Self {
            runtime,
            config,
            sessions: RwLock::new(HandleTable::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Create a session for the model at `model_path`
    pub fn init(&self, model_path: impl AsRef<Path>) -> Result<EngineHandle> {
        let session = EmbeddingSession::create(&self.runtime, model_path.as_ref(), &self.config)?;
        let handle = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(Arc::new(session));
        info!("Session {} ready", handle);
        Ok(handle)
    }

    /// Embed `text` with the session behind `handle`
    pub fn embed(&self, handle: EngineHandle, text: &str) -> Result<Vec<f32>> {
        let session = self.session(handle)?;
        session.embed(text)
    }

    /// Release the session behind `handle`. A stale or repeated handle is
    /// reported as `InvalidHandle` and leaves every live session untouched.
    pub fn release(&self, handle: EngineHandle) -> Result<()> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle);
        match removed {
            Some(session) => {
                if Arc::strong_count(&session) > 1 {
                    warn!("Session {} released while an embed is in flight", handle);
                }
                info!("Session {} released", handle);
                Ok(())
            }
            None => {
                error!("Release of unknown or already released handle {}", handle);
                Err(EngineError::InvalidHandle(handle.into_raw()))
            }
        }
    }

    pub fn session_info(&self, handle: EngineHandle) -> Result<SessionInfo> {
        Ok(self.session(handle)?.info().clone())
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Resolve `handle` to its session; the session stays alive while the result is held
    pub fn session(&self, handle: EngineHandle) -> Result<SharedSession<R>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .cloned()
            .ok_or_else(|| {
                error!("Embedding handle {} is invalid", handle);
                EngineError::InvalidHandle(handle.into_raw())
            })
    }
}
