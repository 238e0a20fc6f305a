// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tokenizer adapter
//!
//! Turns raw text into a bounded token sequence using the model's vocabulary.
//! Oversized input is truncated to the context window, never rejected.

use crate::error::Result;
use tracing::{debug, warn};

/// Integer token id as used by the model vocabulary
pub type TokenId = i32;

/// Text-to-token conversion provided by a loaded model
#[cfg_attr(test, mockall::automock)]
pub trait Vocabulary {
    /// Full tokenization of `text`. With `add_special` the model's BOS token is added.
    fn str_to_tokens(&self, text: &str, add_special: bool) -> Result<Vec<TokenId>>;
}

/// Sanitize text before it reaches a C string tokenizer
///
/// Only null bytes are removed: llama.cpp takes the text as a C string, which
/// ends at the first NUL. Every other character, control characters included,
/// is passed through and tokenized as written.
pub fn sanitize_for_tokenizer(text: &str) -> String {
    text.replace('\0', "")
}

/// Tokenize `text` into at most `max_tokens` ids.
///
/// Empty text yields an empty sequence without consulting the vocabulary; the
/// caller decides that an empty sequence is a failure. Non-empty text always
/// reaches the vocabulary, even when nothing is left after sanitizing, so it
/// still gets the model's BOS token.
pub fn tokenize<V>(vocab: &V, text: &str, max_tokens: usize) -> Result<Vec<TokenId>>
where
    V: Vocabulary + ?Sized,
{
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let sanitized = sanitize_for_tokenizer(text);
    if sanitized.len() != text.len() {
        warn!(
            "Sanitized text: removed {} problematic bytes (original: {}, sanitized: {})",
            text.len() - sanitized.len(),
            text.len(),
            sanitized.len()
        );
    }

    let mut tokens = vocab.str_to_tokens(&sanitized, true)?;
    let required = tokens.len();
    if required > max_tokens {
        warn!(
            "Input needs {} tokens, truncating to context limit {}",
            required, max_tokens
        );
        tokens.truncate(max_tokens);
    }
    debug!("Tokenized {} bytes into {} tokens", text.len(), tokens.len());
    Ok(tokens)
}
