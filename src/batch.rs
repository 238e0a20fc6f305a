// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-sequence decode batch
//!
//! A `SequenceBatch` is a plain value built per embed call. The runtime turns it
//! into its own native batch for the duration of one decode step.

use crate::tokenizer::TokenId;

/// Sequence id of the only sequence this engine ever decodes
pub const SEQUENCE_ID: i32 = 0;

/// One token slot in a decode batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchEntry {
    pub token: TokenId,
    pub pos: i32,
    pub seq_id: i32,
    /// Whether the decode step must produce output for this position
    pub output: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceBatch {
    entries: Vec<BatchEntry>,
}

impl SequenceBatch {
    /// Positions run `0..tokens.len()`, all in sequence 0, every position flagged for output.
    pub fn from_tokens(tokens: &[TokenId]) -> Self {
        let entries = tokens
            .iter()
            .zip(0i32..)
            .map(|(&token, pos)| BatchEntry {
                token,
                pos,
                seq_id: SEQUENCE_ID,
                output: true,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct sequences the native batch must reserve
    pub fn n_seq(&self) -> i32 {
        1
    }
}
