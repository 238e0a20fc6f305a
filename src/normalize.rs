// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vector post-processing for pooled embeddings

/// Scale `values` to unit Euclidean length in place.
///
/// A vector whose sum of squares is not positive (all zeros) is left unchanged.
pub fn normalize_l2(values: &mut [f32]) {
    let sum: f32 = values.iter().map(|v| v * v).sum();
    if sum <= 0.0 {
        return;
    }
    let inv = 1.0 / sum.sqrt();
    for value in values.iter_mut() {
        *value *= inv;
    }
}

/// Cosine similarity of two equal-length vectors; 0.0 when either is all zeros
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
