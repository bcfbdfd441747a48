//! User Similarity
//!
//! Pairwise similarity between users over their co-rated movies, plus the
//! cached symmetric similarity matrix.
//!
//! Core principles:
//! - Similarity is computed only over the co-rated set (positions where both
//!   dense rating vectors are nonzero)
//! - Too few co-rated movies means no reliable signal: the score is 0, not an
//!   error
//! - Zero variance in either co-rated sub-vector also yields 0, never NaN
//!
//! Mathematical formulas:
//! - Pearson: r = (nΣxy − ΣxΣy) / sqrt((nΣx² − (Σx)²)(nΣy² − (Σy)²))
//! - Cosine:  s = Σxy / (‖x‖ · ‖y‖)
//!
//! References:
//! - Resnick, P., et al. (1994). GroupLens: an open architecture for
//!   collaborative filtering of netnews.
//! - Herlocker, J. L., et al. (1999). An algorithmic framework for performing
//!   collaborative filtering.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::store::RatingStore;
use crate::types::EPSILON;

// ==================== Similarity Method ====================

/// Similarity measure used for the user-user matrix
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMethod {
    /// Pearson correlation over co-rated movies (default)
    #[default]
    Pearson,
    /// Cosine similarity over co-rated movies
    Cosine,
}

impl SimilarityMethod {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pearson" => Some(SimilarityMethod::Pearson),
            "cosine" => Some(SimilarityMethod::Cosine),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMethod::Pearson => "pearson",
            SimilarityMethod::Cosine => "cosine",
        }
    }
}

// ==================== Pairwise Similarity ====================

/// Extract the co-rated pairs of two dense rating vectors (positions where
/// both entries are nonzero)
pub fn co_rated_pairs(v1: &[f64], v2: &[f64]) -> Vec<(f64, f64)> {
    v1.iter()
        .zip(v2.iter())
        .filter(|(&a, &b)| a > 0.0 && b > 0.0)
        .map(|(&a, &b)| (a, b))
        .collect()
}

/// Pearson correlation coefficient restricted to co-rated movies
///
/// Returns 0.0 when fewer than `min_common` movies are co-rated, or when
/// either co-rated sub-vector has no variance.
pub fn pearson_correlation(v1: &[f64], v2: &[f64], min_common: usize) -> f64 {
    let common = co_rated_pairs(v1, v2);
    if common.len() < min_common {
        return 0.0;
    }

    let n = common.len() as f64;
    let sum1: f64 = common.iter().map(|(a, _)| a).sum();
    let sum2: f64 = common.iter().map(|(_, b)| b).sum();
    let sum1_sq: f64 = common.iter().map(|(a, _)| a * a).sum();
    let sum2_sq: f64 = common.iter().map(|(_, b)| b * b).sum();
    let p_sum: f64 = common.iter().map(|(a, b)| a * b).sum();

    let num = p_sum - sum1 * sum2 / n;
    let den1 = sum1_sq - sum1 * sum1 / n;
    let den2 = sum2_sq - sum2 * sum2 / n;

    // No variance in either sub-vector: no signal
    if den1 < EPSILON || den2 < EPSILON {
        return 0.0;
    }

    num / (den1 * den2).sqrt()
}

/// Cosine similarity restricted to co-rated movies
///
/// Same `min_common` gate as Pearson; zero norms yield 0.0.
pub fn cosine_similarity(v1: &[f64], v2: &[f64], min_common: usize) -> f64 {
    let common = co_rated_pairs(v1, v2);
    if common.len() < min_common {
        return 0.0;
    }

    let dot: f64 = common.iter().map(|(a, b)| a * b).sum();
    let norm1: f64 = common.iter().map(|(a, _)| a * a).sum::<f64>().sqrt();
    let norm2: f64 = common.iter().map(|(_, b)| b * b).sum::<f64>().sqrt();

    if norm1 < EPSILON || norm2 < EPSILON {
        return 0.0;
    }

    dot / (norm1 * norm2)
}

/// Dispatch on the configured similarity method
pub fn compute(method: SimilarityMethod, v1: &[f64], v2: &[f64], min_common: usize) -> f64 {
    match method {
        SimilarityMethod::Pearson => pearson_correlation(v1, v2, min_common),
        SimilarityMethod::Cosine => cosine_similarity(v1, v2, min_common),
    }
}

// ==================== Similarity Matrix ====================

/// Symmetric user-user similarity matrix, flat row-major storage
///
/// Pure derived cache: rebuilt in full from the store, never updated
/// incrementally. The diagonal is 1.0 by convention.
#[derive(Clone, Debug)]
pub struct SimilarityMatrix {
    /// n*n similarities, row-major
    values: Vec<f64>,
    /// Number of users at build time
    n: usize,
}

impl SimilarityMatrix {
    /// Build the full matrix from the store's current contents
    ///
    /// Only the upper triangle is computed (in parallel over pairs) and then
    /// mirrored.
    pub fn build(store: &RatingStore, method: SimilarityMethod, min_common: usize) -> Self {
        let n = store.user_count();
        let vectors: Vec<Vec<f64>> = store
            .users()
            .iter()
            .map(|u| store.rating_vector(&u.id))
            .collect();

        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();
        let similarities: Vec<f64> = pairs
            .par_iter()
            .map(|&(i, j)| compute(method, &vectors[i], &vectors[j], min_common))
            .collect();

        let mut values = vec![0.0; n * n];
        for (&(i, j), &sim) in pairs.iter().zip(similarities.iter()) {
            values[i * n + j] = sim;
            values[j * n + i] = sim;
        }
        for i in 0..n {
            values[i * n + i] = 1.0;
        }

        Self { values, n }
    }

    /// Similarity between user positions i and j; 0.0 out of range
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i < self.n && j < self.n {
            self.values[i * self.n + j]
        } else {
            0.0
        }
    }

    /// Full similarity row for user position i
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n..(i + 1) * self.n]
    }

    /// Number of users the matrix was built over
    pub fn user_count(&self) -> usize {
        self.n
    }

    /// Raw flat values (row-major)
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}
