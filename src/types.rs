//! Common Types and Constants
//!
//! Shared data structures used across all engine modules.

use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Numerical stability epsilon
pub const EPSILON: f64 = 1e-10;

// ==================== Catalog Records ====================

/// A rating user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user id
    pub id: String,
    /// Display name (surfaced in recommendation reasons)
    pub name: String,
}

/// A rateable movie
///
/// The engine only needs identity; title and genres are carried as opaque
/// metadata for the consuming layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    /// Unique movie id
    pub id: String,
    /// Display title
    pub title: String,
    /// Genre labels
    pub genres: Vec<String>,
}

/// A single user-movie rating on a 1-5 scale
///
/// At most one rating exists per (user, movie) pair; re-rating overwrites the
/// stored value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    /// Rating user id
    pub user_id: String,
    /// Rated movie id
    pub movie_id: String,
    /// Rating value, expected in [1, rating_scale]
    pub rating: f64,
}

// ==================== Derived Results ====================

/// A neighbor returned by similarity search
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimilarUser {
    /// The neighboring user
    pub user: User,
    /// Pairwise similarity in [-1, 1]
    pub similarity: f64,
}

/// A single ranked recommendation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recommendation {
    /// Recommended movie
    pub movie: Movie,
    /// Predicted rating in [0, rating_scale]
    pub predicted_rating: f64,
    /// Confidence score in [0, 1]
    pub confidence: f64,
    /// Human-readable justification
    pub reason: String,
}

/// Pre-flight answer to "can this user get recommendations at all?"
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendationEligibility {
    /// Whether enough qualified neighbors exist
    pub can_receive: bool,
    /// Human-readable explanation
    pub reason: String,
    /// Number of qualified neighbors found
    pub similar_users_count: usize,
}

/// Diagnostic summary for a single (user, movie) recommendation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Whether any qualifying contributor exists
    pub has_similar_users: bool,
    /// Number of qualifying contributors
    pub similar_users_count: usize,
    /// Mean contributor similarity
    pub average_similarity: f64,
    /// Lowest contributor similarity
    pub min_similarity: f64,
    /// Highest contributor similarity
    pub max_similarity: f64,
    /// Whether contributor count and confidence both clear their thresholds
    pub can_recommend: bool,
}

/// Aggregate counters over the current store contents
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemStats {
    /// Number of registered users
    pub num_users: usize,
    /// Number of registered movies
    pub num_movies: usize,
    /// Number of stored ratings (after overwrites)
    pub total_ratings: usize,
    /// Mean ratings per user (0.0 when no users)
    pub avg_ratings_per_user: f64,
    /// Active similarity method
    pub similarity_method: crate::similarity::SimilarityMethod,
}
