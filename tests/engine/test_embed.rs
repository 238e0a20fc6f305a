// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embed pipeline behaviour: output shape, normalization, truncation,
//! determinism, and recovery after failed calls.

use crate::common::*;
use fabstir_embed_engine::{EngineConfig, EngineError};
use std::sync::atomic::Ordering;

#[test]
fn test_embed_returns_unit_vector_of_model_width() {
    let dir = ModelDir::new();
    let (engine, _stats) = default_engine();
    let handle = engine.init(dir.model()).unwrap();

    let embedding = engine.embed(handle, "What is the capital of France?").unwrap();
    assert_eq!(embedding.len(), FAKE_N_EMBD);
    assert!((l2_norm(&embedding) - 1.0).abs() < 1e-5);
    assert!(embedding.iter().all(|v| v.is_finite()));

    engine.release(handle).unwrap();
}

#[test]
fn test_same_text_gives_identical_vectors() {
    let dir = ModelDir::new();
    let (engine, stats) = default_engine();
    let handle = engine.init(dir.model()).unwrap();

    let first = engine.embed(handle, "deterministic embeddings").unwrap();
    let second = engine.embed(handle, "deterministic embeddings").unwrap();
    assert_eq!(first, second);
    // memory is cleared before every decode
    assert_eq!(stats.clears.load(Ordering::SeqCst), 2);

    engine.release(handle).unwrap();
}

#[test]
fn test_previous_call_does_not_leak_into_next() {
    let dir = ModelDir::new();
    let (engine, _stats) = default_engine();
    let handle = engine.init(dir.model()).unwrap();

    let fresh = engine.embed(handle, "second text").unwrap();
    engine.embed(handle, "a completely unrelated first text").unwrap();
    let after = engine.embed(handle, "second text").unwrap();
    assert_eq!(fresh, after);

    engine.release(handle).unwrap();
}

#[test]
fn test_different_texts_give_different_vectors() {
    let dir = ModelDir::new();
    let (engine, _stats) = default_engine();
    let handle = engine.init(dir.model()).unwrap();

    let a = engine.embed(handle, "graph neural networks").unwrap();
    let b = engine.embed(handle, "sourdough bread recipe").unwrap();
    assert_ne!(a, b);

    engine.release(handle).unwrap();
}

#[test]
fn test_empty_text_fails_without_decoding() {
    let dir = ModelDir::new();
    let (engine, stats) = default_engine();
    let handle = engine.init(dir.model()).unwrap();

    let result = engine.embed(handle, "");
    assert!(matches!(result, Err(EngineError::EmptyTokens)));
    assert_eq!(stats.decodes.load(Ordering::SeqCst), 0);

    engine.release(handle).unwrap();
}

#[test]
fn test_control_character_text_still_embeds() {
    let dir = ModelDir::new();
    let (engine, _stats) = default_engine();
    let handle = engine.init(dir.model()).unwrap();

    for text in ["\x0c", "\x1b", "\0\0\0"] {
        let embedding = engine.embed(handle, text).unwrap();
        assert_eq!(embedding.len(), FAKE_N_EMBD);
        assert!((l2_norm(&embedding) - 1.0).abs() < 1e-5);
    }

    engine.release(handle).unwrap();
}

#[test]
fn test_form_feed_is_not_dropped_from_text() {
    let dir = ModelDir::new();
    let (engine, _stats) = default_engine();
    let handle = engine.init(dir.model()).unwrap();

    // the fake vocabulary splits on form feeds like any other whitespace
    let with_form_feed = engine.embed(handle, "page one\x0cpage two").unwrap();
    let with_space = engine.embed(handle, "page one page two").unwrap();
    let glued = engine.embed(handle, "page onepage two").unwrap();
    assert_eq!(with_form_feed, with_space);
    assert_ne!(with_form_feed, glued);

    engine.release(handle).unwrap();
}

#[test]
fn test_oversized_input_is_truncated_not_rejected() {
    let dir = ModelDir::new();
    let runtime = FakeRuntime::default();
    let stats = runtime.stats.clone();
    let engine = engine_with(
        runtime,
        EngineConfig {
            context_size: 8,
            ..Default::default()
        },
    );
    let handle = engine.init(dir.model()).unwrap();

    let embedding = engine.embed(handle, &words(50)).unwrap();
    assert_eq!(embedding.len(), FAKE_N_EMBD);
    assert!((l2_norm(&embedding) - 1.0).abs() < 1e-5);
    assert_eq!(stats.last_batch_len.load(Ordering::SeqCst), 8);

    engine.release(handle).unwrap();
}

#[test]
fn test_truncation_uses_realized_context_length() {
    let dir = ModelDir::new();
    let runtime = FakeRuntime {
        ctx_cap: Some(5),
        ..Default::default()
    };
    let stats = runtime.stats.clone();
    let engine = engine_with(runtime, EngineConfig::default());
    let handle = engine.init(dir.model()).unwrap();

    // first five tokens are identical, so the truncated inputs embed identically
    let long = engine.embed(handle, &words(40)).unwrap();
    let longer = engine.embed(handle, &words(400)).unwrap();
    assert_eq!(stats.last_batch_len.load(Ordering::SeqCst), 5);
    assert_eq!(long, longer);

    engine.release(handle).unwrap();
}

#[test]
fn test_truncation_respects_batch_size_when_context_is_padded() {
    let dir = ModelDir::new();
    let runtime = FakeRuntime {
        ctx_padding: 24,
        ..Default::default()
    };
    let stats = runtime.stats.clone();
    let engine = engine_with(
        runtime,
        EngineConfig {
            context_size: 8,
            ..Default::default()
        },
    );
    let handle = engine.init(dir.model()).unwrap();

    let info = engine.session_info(handle).unwrap();
    assert_eq!(info.n_ctx, 32);
    assert_eq!(info.max_tokens, 8);

    let embedding = engine.embed(handle, &words(50)).unwrap();
    assert_eq!(embedding.len(), FAKE_N_EMBD);
    assert_eq!(stats.last_batch_len.load(Ordering::SeqCst), 8);

    engine.release(handle).unwrap();
}

#[test]
fn test_zero_vector_is_returned_unchanged() {
    let dir = ModelDir::new();
    let (engine, _stats) = default_engine();
    let handle = engine.init(dir.model()).unwrap();

    let embedding = engine.embed(handle, ZERO_WORD).unwrap();
    assert_eq!(embedding, vec![0.0f32; FAKE_N_EMBD]);

    engine.release(handle).unwrap();
}

#[test]
fn test_decode_failure_leaves_session_reusable() {
    let dir = ModelDir::new();
    let (engine, stats) = default_engine();
    let handle = engine.init(dir.model()).unwrap();

    let baseline = engine.embed(handle, "recover after failure").unwrap();

    stats.fail_next_decode.store(true, Ordering::SeqCst);
    let result = engine.embed(handle, "recover after failure");
    assert!(matches!(result, Err(EngineError::Decode(_))));

    let again = engine.embed(handle, "recover after failure").unwrap();
    assert_eq!(baseline, again);

    engine.release(handle).unwrap();
}

#[test]
fn test_missing_embeddings_is_reported() {
    let dir = ModelDir::new();
    let (engine, stats) = default_engine();
    let handle = engine.init(dir.model()).unwrap();

    stats.withhold_next_embedding.store(true, Ordering::SeqCst);
    let result = engine.embed(handle, "no pooled output");
    assert!(matches!(result, Err(EngineError::MissingEmbeddings(_))));

    assert!(engine.embed(handle, "no pooled output").is_ok());

    engine.release(handle).unwrap();
}

#[test]
fn test_returned_vector_is_an_independent_copy() {
    let dir = ModelDir::new();
    let (engine, _stats) = default_engine();
    let handle = engine.init(dir.model()).unwrap();

    let mut first = engine.embed(handle, "copy semantics").unwrap();
    let expected = first.clone();
    first.iter_mut().for_each(|v| *v = 42.0);

    let second = engine.embed(handle, "copy semantics").unwrap();
    assert_eq!(second, expected);

    engine.release(handle).unwrap();
}

#[test]
fn test_embedding_narrower_model() {
    let dir = ModelDir::new();
    let runtime = FakeRuntime {
        n_embd: 3,
        ..Default::default()
    };
    let engine = engine_with(runtime, EngineConfig::default());
    let handle = engine.init(dir.model()).unwrap();

    let embedding = engine.embed(handle, "tiny").unwrap();
    assert_eq!(embedding.len(), 3);
    assert!((l2_norm(&embedding) - 1.0).abs() < 1e-5);

    engine.release(handle).unwrap();
}
