//! # tuijian-algo - Movie Recommendation Core Algorithms
//!
//! This crate provides a pure Rust implementation of user-based
//! collaborative filtering:
//!
//! - **Rating Store** - users, movies, and ratings with dense rating vectors
//! - **Similarity Engine** - cached Pearson/cosine user-user similarity
//! - **Prediction Engine** - threshold-gated weighted-average predictions
//! - **Recommendation Engine** - ranked, confidence-gated top-N lists
//!
//! ## Design Goals
//!
//! - **Pure Rust** - no binding dependencies, usable in any Rust project
//! - **Predictable** - sparse-data conditions answer with empty/absent
//!   values, never errors
//! - **Fully tested** - unit scenarios plus property-based invariants
//! - **Fast enough** - parallel matrix rebuild, tuned for catalogs of
//!   hundreds of users and movies
//!
//! ## Module Structure
//!
//! - [`store`] - in-memory rating store (users, movies, ratings)
//! - [`similarity`] - similarity math and the cached symmetric matrix
//! - [`engine`] - prediction, ranking, confidence, and diagnostics
//! - [`config`] - engine thresholds with production defaults
//! - [`sanitize`] - record validation for the ingestion boundary
//! - [`types`] - public records and shared constants
//!
//! ## Usage Example
//!
//! ```rust
//! use tuijian_algo::{CollaborativeFiltering, Movie, Rating, User};
//!
//! let mut engine = CollaborativeFiltering::new();
//! for (id, name) in [("u1", "Alice"), ("u2", "Bob"), ("u3", "Carol")] {
//!     engine.add_user(User { id: id.into(), name: name.into() });
//! }
//! for id in ["m1", "m2", "m3", "m4"] {
//!     engine.add_movie(Movie { id: id.into(), title: id.into(), genres: vec![] });
//! }
//! for (user_id, movie_id, value) in [
//!     ("u1", "m1", 4.0), ("u1", "m2", 5.0),
//!     ("u2", "m1", 4.0), ("u2", "m2", 5.0), ("u2", "m4", 5.0),
//!     ("u3", "m1", 4.0), ("u3", "m2", 5.0), ("u3", "m4", 4.0),
//! ] {
//!     engine.add_rating(Rating {
//!         user_id: user_id.into(),
//!         movie_id: movie_id.into(),
//!         rating: value,
//!     });
//! }
//!
//! // Bob and Carol agree with Alice, so their m4 ratings carry over
//! let recommendations = engine.get_recommendations("u1", None);
//! assert_eq!(recommendations[0].movie.id, "m4");
//! assert!(recommendations[0].confidence >= 0.4);
//! ```

// ============================================================================
// Module declarations
// ============================================================================

pub mod config;
pub mod engine;
pub mod sanitize;
pub mod similarity;
pub mod store;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

/// Re-export all public record types
pub use types::*;

/// Re-export the engine configuration
pub use config::RecommendConfig;

/// Re-export the collaborative filtering engine
pub use engine::{confidence_score, CollaborativeFiltering};

/// Re-export similarity primitives
pub use similarity::{
    cosine_similarity, pearson_correlation, SimilarityMatrix, SimilarityMethod,
};

/// Re-export the rating store
pub use store::RatingStore;

/// Re-export the boundary validation error
pub use sanitize::ValidationError;
