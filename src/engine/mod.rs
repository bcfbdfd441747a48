//! User-Based Collaborative Filtering Engine
//!
//! Owns the rating store and a lazily rebuilt similarity matrix, and layers
//! neighbor search, rating prediction, and confidence-gated recommendation
//! ranking on top of them.
//!
//! Core principles:
//! - The similarity matrix is a pure cache: every store mutation invalidates
//!   it, the next query rebuilds it in full (no incremental updates)
//! - Every "cannot compute" condition is an expected outcome, answered with
//!   an empty list or `None`, never an error
//! - Neighbor weights are pre-filtered to be at least `min_threshold`, so
//!   weighted-average denominators are positive whenever contributors exist
//!
//! Mathematical formulas:
//! - Prediction: p = Σ(sim_i · rating_i) / Σ(sim_i) over contributors
//! - Confidence: c = clamp(0, 1, avg_sim · (1 − penalty) + bonus)
//!   - penalty = max(0, (min_threshold − avg_sim) / min_threshold)
//!   - bonus = min(0.20, 0.05 · contributor_count)
//!
//! References:
//! - Resnick, P., et al. (1994). GroupLens: an open architecture for
//!   collaborative filtering of netnews.
//! - Schafer, J. B., et al. (2007). Collaborative filtering recommender
//!   systems.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::debug;

use crate::config::RecommendConfig;
use crate::sanitize::{
    has_invalid_values, validate_id, validate_rating_value, ValidationError,
};
use crate::similarity::{SimilarityMatrix, SimilarityMethod};
use crate::store::RatingStore;
use crate::types::{
    Movie, QualityMetrics, Rating, Recommendation, RecommendationEligibility, SimilarUser,
    SystemStats, User, EPSILON,
};

// ==================== Constants ====================

/// Confidence bonus per contributing neighbor
const NEIGHBOR_BONUS_STEP: f64 = 0.05;

/// Cap on the neighbor-count confidence bonus
const NEIGHBOR_BONUS_CAP: f64 = 0.20;

/// Confidence gap below which two candidates rank as tied
const CONFIDENCE_TIE_EPSILON: f64 = 0.01;

/// Neighbor pool sampled when naming the top contributor in a reason string
const REASON_NEIGHBOR_POOL: usize = 10;

// ==================== Confidence Scoring ====================

/// Confidence score for a set of contributor similarities
///
/// Distinct from raw similarity: the mean contributor similarity is penalized
/// when it sits near the contribution floor and rewarded for corroborating
/// neighbors, then clamped to [0, 1].
pub fn confidence_score(similarities: &[f64], config: &RecommendConfig) -> f64 {
    if !config.has_enough_neighbors(similarities.len()) {
        return 0.0;
    }

    let avg = similarities.iter().sum::<f64>() / similarities.len() as f64;
    let penalty = if config.min_threshold > EPSILON {
        ((config.min_threshold - avg) / config.min_threshold).max(0.0)
    } else {
        0.0
    };

    let mut confidence = avg * (1.0 - penalty);

    let bonus = (NEIGHBOR_BONUS_STEP * similarities.len() as f64).min(NEIGHBOR_BONUS_CAP);
    confidence = (confidence + bonus).min(1.0);

    confidence.max(0.0)
}

// ==================== Engine ====================

/// An unrated movie that survived every recommendation gate
#[derive(Clone, Debug)]
struct Candidate {
    movie: Movie,
    predicted_rating: f64,
    confidence: f64,
    contributor_count: usize,
}

/// User-based collaborative filtering engine
///
/// Single-writer: query methods take `&mut self` because a stale similarity
/// cache may be rebuilt lazily on read.
#[derive(Clone, Debug)]
pub struct CollaborativeFiltering {
    /// Raw users, movies, and ratings
    store: RatingStore,
    /// Threshold configuration shared by all stages
    config: RecommendConfig,
    /// Similarity measure for the user-user matrix
    method: SimilarityMethod,
    /// Cached similarity matrix; `None` means stale/unbuilt
    matrix: Option<SimilarityMatrix>,
}

impl Default for CollaborativeFiltering {
    fn default() -> Self {
        Self::new()
    }
}

impl CollaborativeFiltering {
    /// Create an engine with default configuration and Pearson similarity
    pub fn new() -> Self {
        Self::with_options(RecommendConfig::default(), SimilarityMethod::default())
    }

    /// Create an engine with a custom configuration
    pub fn with_config(config: RecommendConfig) -> Self {
        Self::with_options(config, SimilarityMethod::default())
    }

    /// Create an engine with a specific similarity method
    pub fn with_method(method: SimilarityMethod) -> Self {
        Self::with_options(RecommendConfig::default(), method)
    }

    /// Create an engine with custom configuration and similarity method
    pub fn with_options(config: RecommendConfig, method: SimilarityMethod) -> Self {
        Self {
            store: RatingStore::new(),
            config,
            method,
            matrix: None,
        }
    }

    // ==================== Accessors ====================

    /// The underlying rating store
    pub fn store(&self) -> &RatingStore {
        &self.store
    }

    /// The active configuration
    pub fn config(&self) -> &RecommendConfig {
        &self.config
    }

    /// The active similarity method
    pub fn method(&self) -> SimilarityMethod {
        self.method
    }

    // ==================== Ingestion ====================

    /// Add a user and invalidate the similarity cache
    pub fn add_user(&mut self, user: User) {
        self.store.add_user(user);
        self.invalidate();
    }

    /// Add a movie and invalidate the similarity cache
    pub fn add_movie(&mut self, movie: Movie) {
        self.store.add_movie(movie);
        self.invalidate();
    }

    /// Add a rating and invalidate the similarity cache
    ///
    /// Unchecked: out-of-range values are the caller's responsibility (see
    /// [`CollaborativeFiltering::try_add_rating`] for the validated path).
    /// A re-rating overwrites the stored value.
    pub fn add_rating(&mut self, rating: Rating) {
        self.store.add_rating(rating);
        self.invalidate();
    }

    /// Validated counterpart of [`CollaborativeFiltering::add_user`];
    /// rejects empty and duplicate ids
    pub fn try_add_user(&mut self, user: User) -> Result<(), ValidationError> {
        validate_id(&user.id)?;
        if self.store.user_position(&user.id).is_some() {
            return Err(ValidationError::DuplicateId(user.id));
        }
        self.add_user(user);
        Ok(())
    }

    /// Validated counterpart of [`CollaborativeFiltering::add_movie`];
    /// rejects empty and duplicate ids
    pub fn try_add_movie(&mut self, movie: Movie) -> Result<(), ValidationError> {
        validate_id(&movie.id)?;
        if self.store.movie_position(&movie.id).is_some() {
            return Err(ValidationError::DuplicateId(movie.id));
        }
        self.add_movie(movie);
        Ok(())
    }

    /// Validated counterpart of [`CollaborativeFiltering::add_rating`];
    /// requires a known user and movie and a finite value in
    /// [1, rating_scale]. Re-rating an already-rated movie is allowed.
    pub fn try_add_rating(&mut self, rating: Rating) -> Result<(), ValidationError> {
        validate_rating_value(rating.rating, self.config.rating_scale)?;
        if self.store.user_position(&rating.user_id).is_none() {
            return Err(ValidationError::UnknownUser(rating.user_id));
        }
        if self.store.movie_position(&rating.movie_id).is_none() {
            return Err(ValidationError::UnknownMovie(rating.movie_id));
        }
        self.add_rating(rating);
        Ok(())
    }

    // ==================== Similarity Cache ====================

    fn invalidate(&mut self) {
        self.matrix = None;
    }

    /// Rebuild the similarity matrix if stale; no-op while valid
    fn ensure_matrix(&mut self) {
        if self.matrix.is_some() {
            return;
        }
        debug!(
            users = self.store.user_count(),
            movies = self.store.movie_count(),
            method = self.method.as_str(),
            "rebuilding similarity matrix"
        );
        let matrix =
            SimilarityMatrix::build(&self.store, self.method, self.config.min_common_ratings);
        debug_assert!(!has_invalid_values(matrix.values()));
        self.matrix = Some(matrix);
    }

    /// Pairwise similarity between two users; 0.0 for unknown users
    pub fn similarity(&mut self, user_id1: &str, user_id2: &str) -> f64 {
        self.ensure_matrix();
        let (matrix, store) = match &self.matrix {
            Some(m) => (m, &self.store),
            None => return 0.0,
        };
        match (store.user_position(user_id1), store.user_position(user_id2)) {
            (Some(i), Some(j)) => matrix.get(i, j),
            _ => 0.0,
        }
    }

    // ==================== Neighbor Search ====================

    /// The up-to-k most similar users above the contribution threshold,
    /// descending by similarity (ties keep user insertion order)
    ///
    /// `k` defaults to `max_similar_users`. Unknown users get an empty list.
    pub fn find_similar_users(&mut self, user_id: &str, k: Option<usize>) -> Vec<SimilarUser> {
        self.ensure_matrix();
        let k = k.unwrap_or(self.config.max_similar_users);
        self.find_similar_users_built(user_id, k)
    }

    /// Neighbor search against an already-built matrix
    fn find_similar_users_built(&self, user_id: &str, k: usize) -> Vec<SimilarUser> {
        let matrix = match &self.matrix {
            Some(m) => m,
            None => return Vec::new(),
        };
        let pos = match self.store.user_position(user_id) {
            Some(p) => p,
            None => return Vec::new(),
        };

        let mut similar: Vec<SimilarUser> = matrix
            .row(pos)
            .iter()
            .zip(self.store.users())
            .filter(|(&similarity, user)| {
                user.id != user_id
                    && self.config.meets_similarity_threshold(similarity)
                    && similarity > 0.0
            })
            .map(|(&similarity, user)| SimilarUser {
                user: user.clone(),
                similarity,
            })
            .collect();

        // Stable sort: equal similarities keep insertion order
        similar.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        similar.truncate(k);
        similar
    }

    /// Neighbors who actually rated the movie, usable as prediction weights
    fn contributors(&self, neighbors: &[SimilarUser], movie_id: &str) -> Vec<(SimilarUser, f64)> {
        neighbors
            .iter()
            .filter_map(|n| match self.store.rating_of(&n.user.id, movie_id) {
                Some(rating)
                    if rating > 0.0 && self.config.meets_similarity_threshold(n.similarity) =>
                {
                    Some((n.clone(), rating))
                }
                _ => None,
            })
            .collect()
    }

    // ==================== Prediction ====================

    /// Predicted rating for a (user, movie) pair
    ///
    /// Returns the stored rating directly when the user already rated the
    /// movie; otherwise behaves like
    /// [`CollaborativeFiltering::predict_unrated`]. `None` means no reliable
    /// prediction exists.
    pub fn predict_rating(&mut self, user_id: &str, movie_id: &str) -> Option<f64> {
        self.ensure_matrix();
        self.predict_rating_built(user_id, movie_id)
    }

    /// Model-only prediction, ignoring any stored rating by the user
    ///
    /// `None` when the user is unknown, fewer than `min_similar_users`
    /// neighbors contribute, or the weighted average falls below
    /// `min_predicted`.
    pub fn predict_unrated(&mut self, user_id: &str, movie_id: &str) -> Option<f64> {
        self.ensure_matrix();
        self.predict_unrated_built(user_id, movie_id)
    }

    fn predict_rating_built(&self, user_id: &str, movie_id: &str) -> Option<f64> {
        self.store.user(user_id)?;
        if let Some(existing) = self.store.rating_of(user_id, movie_id) {
            return Some(existing);
        }
        self.predict_unrated_built(user_id, movie_id)
    }

    fn predict_unrated_built(&self, user_id: &str, movie_id: &str) -> Option<f64> {
        self.store.user(user_id)?;

        let neighbors = self.find_similar_users_built(user_id, self.config.max_similar_users);
        let contributors = self.contributors(&neighbors, movie_id);
        if !self.config.has_enough_neighbors(contributors.len()) {
            return None;
        }

        let mut weighted_sum = 0.0;
        let mut similarity_sum = 0.0;
        for (neighbor, rating) in &contributors {
            weighted_sum += neighbor.similarity * rating;
            similarity_sum += neighbor.similarity;
        }
        if similarity_sum <= 0.0 {
            return None;
        }

        let predicted = weighted_sum / similarity_sum;
        if !self.config.meets_predicted_threshold(predicted) {
            return None;
        }

        // Weighted averages of in-scale ratings cannot leave the scale;
        // the clamp guards accumulated float drift
        Some(predicted.clamp(0.0, self.config.rating_scale))
    }

    // ==================== Recommendation ====================

    /// Ranked, confidence-gated top-n recommendations for a user
    ///
    /// `n` defaults to `max_recommendations`. Movies the user already rated
    /// are always excluded; unknown users get an empty list.
    pub fn get_recommendations(&mut self, user_id: &str, n: Option<usize>) -> Vec<Recommendation> {
        self.ensure_matrix();
        let n = n.unwrap_or(self.config.max_recommendations);
        self.recommendations_built(user_id, n)
    }

    fn recommendations_built(&self, user_id: &str, n: usize) -> Vec<Recommendation> {
        if self.store.user(user_id).is_none() {
            return Vec::new();
        }

        let rated: HashSet<&str> = self
            .store
            .user_ratings(user_id)
            .iter()
            .map(|r| r.movie_id.as_str())
            .collect();
        let neighbors = self.find_similar_users_built(user_id, self.config.max_similar_users);

        let mut candidates: Vec<Candidate> = Vec::new();
        for movie in self.store.movies() {
            if rated.contains(movie.id.as_str()) {
                continue;
            }

            let contributors = self.contributors(&neighbors, &movie.id);
            if !self.config.has_enough_neighbors(contributors.len()) {
                continue;
            }

            // Gate re-checked inside the prediction as well
            let predicted_rating = match self.predict_rating_built(user_id, &movie.id) {
                Some(p) if self.config.meets_predicted_threshold(p) => p,
                _ => continue,
            };

            let similarities: Vec<f64> =
                contributors.iter().map(|(c, _)| c.similarity).collect();
            let confidence = confidence_score(&similarities, &self.config);
            if confidence < self.config.confidence_threshold {
                continue;
            }

            candidates.push(Candidate {
                movie: movie.clone(),
                predicted_rating,
                confidence,
                contributor_count: contributors.len(),
            });
        }

        // Confidence descending (differences within the tie epsilon rank as
        // equal), then predicted rating descending
        candidates.sort_by(|a, b| {
            let ka = (a.confidence / CONFIDENCE_TIE_EPSILON).round() as i64;
            let kb = (b.confidence / CONFIDENCE_TIE_EPSILON).round() as i64;
            kb.cmp(&ka).then_with(|| {
                b.predicted_rating
                    .partial_cmp(&a.predicted_rating)
                    .unwrap_or(Ordering::Equal)
            })
        });
        candidates.truncate(n);

        candidates
            .into_iter()
            .map(|c| Recommendation {
                reason: self.recommendation_reason(user_id, &c.movie.id, c.contributor_count),
                movie: c.movie,
                predicted_rating: c.predicted_rating,
                confidence: c.confidence,
            })
            .collect()
    }

    /// Human-readable justification naming the contributor count and the top
    /// contributing neighbor
    fn recommendation_reason(
        &self,
        user_id: &str,
        movie_id: &str,
        contributor_count: usize,
    ) -> String {
        let pool = self.find_similar_users_built(user_id, REASON_NEIGHBOR_POOL);
        let relevant: Vec<&SimilarUser> = pool
            .iter()
            .filter(
                |n| matches!(self.store.rating_of(&n.user.id, movie_id), Some(r) if r > 0.0),
            )
            .collect();

        if !self.config.has_enough_neighbors(relevant.len()) {
            return "Insufficient similar users for reliable recommendation".to_string();
        }

        // Pool is sorted descending, so the first relevant entry is the top
        // contributor
        let top = relevant[0];
        format!(
            "Based on {} similar users ({} is {:.1}% similar)",
            contributor_count,
            top.user.name,
            top.similarity * 100.0
        )
    }

    // ==================== Diagnostics ====================

    /// Pre-flight check: does this user have enough qualified neighbors to
    /// receive any recommendation at all?
    pub fn can_user_receive_recommendations(&mut self, user_id: &str) -> RecommendationEligibility {
        self.ensure_matrix();
        let neighbors = self.find_similar_users_built(user_id, self.config.max_similar_users);
        let valid_count = neighbors
            .iter()
            .filter(|n| self.config.meets_similarity_threshold(n.similarity))
            .count();

        if !self.config.has_enough_neighbors(valid_count) {
            return RecommendationEligibility {
                can_receive: false,
                reason: format!(
                    "User needs at least {} similar users (found {})",
                    self.config.min_similar_users, valid_count
                ),
                similar_users_count: valid_count,
            };
        }

        RecommendationEligibility {
            can_receive: true,
            reason: format!(
                "User has {valid_count} similar users with sufficient similarity"
            ),
            similar_users_count: valid_count,
        }
    }

    /// Diagnostic summary for a single (user, movie) recommendation
    pub fn recommendation_quality_metrics(
        &mut self,
        user_id: &str,
        movie_id: &str,
    ) -> QualityMetrics {
        self.ensure_matrix();
        let neighbors = self.find_similar_users_built(user_id, self.config.max_similar_users);
        let contributors = self.contributors(&neighbors, movie_id);

        if contributors.is_empty() {
            return QualityMetrics {
                has_similar_users: false,
                similar_users_count: 0,
                average_similarity: 0.0,
                min_similarity: 0.0,
                max_similarity: 0.0,
                can_recommend: false,
            };
        }

        let similarities: Vec<f64> = contributors.iter().map(|(c, _)| c.similarity).collect();
        let average_similarity = similarities.iter().sum::<f64>() / similarities.len() as f64;
        let min_similarity = similarities.iter().copied().fold(f64::MAX, f64::min);
        let max_similarity = similarities.iter().copied().fold(f64::MIN, f64::max);
        let confidence = confidence_score(&similarities, &self.config);

        QualityMetrics {
            has_similar_users: true,
            similar_users_count: contributors.len(),
            average_similarity,
            min_similarity,
            max_similarity,
            can_recommend: self.config.has_enough_neighbors(contributors.len())
                && confidence >= self.config.confidence_threshold,
        }
    }

    /// Aggregate counters over the current store contents
    pub fn system_stats(&self) -> SystemStats {
        let num_users = self.store.user_count();
        let total_ratings = self.store.rating_count();
        let avg_ratings_per_user = if num_users > 0 {
            total_ratings as f64 / num_users as f64
        } else {
            0.0
        };

        SystemStats {
            num_users,
            num_movies: self.store.movie_count(),
            total_ratings,
            avg_ratings_per_user,
            similarity_method: self.method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn movie(id: &str) -> Movie {
        Movie {
            id: id.to_string(),
            title: format!("movie {id}"),
            genres: vec![],
        }
    }

    fn rating(user_id: &str, movie_id: &str, value: f64) -> Rating {
        Rating {
            user_id: user_id.to_string(),
            movie_id: movie_id.to_string(),
            rating: value,
        }
    }

    /// Alice, Bob, and Carol agree exactly on m1-m3, so Bob and Carol are
    /// perfect neighbors of Alice. Dave shares too little to qualify.
    fn create_test_engine() -> CollaborativeFiltering {
        let mut engine = CollaborativeFiltering::new();
        engine.add_user(user("alice", "Alice"));
        engine.add_user(user("bob", "Bob"));
        engine.add_user(user("carol", "Carol"));
        engine.add_user(user("dave", "Dave"));
        for id in ["m1", "m2", "m3", "m4", "m5"] {
            engine.add_movie(movie(id));
        }

        engine.add_rating(rating("alice", "m1", 4.0));
        engine.add_rating(rating("alice", "m2", 5.0));
        engine.add_rating(rating("alice", "m3", 3.0));

        engine.add_rating(rating("bob", "m1", 4.0));
        engine.add_rating(rating("bob", "m2", 5.0));
        engine.add_rating(rating("bob", "m3", 3.0));
        engine.add_rating(rating("bob", "m4", 5.0));
        engine.add_rating(rating("bob", "m5", 5.0));

        engine.add_rating(rating("carol", "m1", 4.0));
        engine.add_rating(rating("carol", "m2", 5.0));
        engine.add_rating(rating("carol", "m3", 3.0));
        engine.add_rating(rating("carol", "m4", 4.0));

        engine.add_rating(rating("dave", "m5", 2.0));
        engine
    }

    // ==================== Similarity & Neighbors ====================

    #[test]
    fn test_similarity_symmetric_and_self_is_one() {
        let mut engine = create_test_engine();
        assert_eq!(engine.similarity("alice", "alice"), 1.0);
        assert_eq!(
            engine.similarity("alice", "bob"),
            engine.similarity("bob", "alice")
        );
        assert_eq!(engine.similarity("alice", "nobody"), 0.0);
    }

    #[test]
    fn test_find_similar_users_filters_and_sorts() {
        let mut engine = create_test_engine();
        let neighbors = engine.find_similar_users("alice", None);

        assert_eq!(neighbors.len(), 2);
        // Perfect agreement on the co-rated set; ties keep insertion order
        assert_eq!(neighbors[0].user.id, "bob");
        assert_eq!(neighbors[1].user.id, "carol");
        assert!((neighbors[0].similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_find_similar_users_respects_k() {
        let mut engine = create_test_engine();
        let neighbors = engine.find_similar_users("alice", Some(1));
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].user.id, "bob");
    }

    #[test]
    fn test_find_similar_users_unknown_user_is_empty() {
        let mut engine = create_test_engine();
        assert!(engine.find_similar_users("nobody", None).is_empty());
    }

    #[test]
    fn test_user_with_no_ratings_has_no_neighbors() {
        let mut engine = create_test_engine();
        engine.add_user(user("erin", "Erin"));

        assert!(engine.find_similar_users("erin", None).is_empty());
        let eligibility = engine.can_user_receive_recommendations("erin");
        assert!(!eligibility.can_receive);
        assert_eq!(eligibility.similar_users_count, 0);
        assert_eq!(
            eligibility.reason,
            "User needs at least 2 similar users (found 0)"
        );
    }

    // ==================== Prediction ====================

    #[test]
    fn test_predict_rating_passthrough_for_rated_movie() {
        let mut engine = create_test_engine();
        assert_eq!(engine.predict_rating("alice", "m2"), Some(5.0));
    }

    #[test]
    fn test_predict_rating_weighted_average() {
        let mut engine = create_test_engine();
        // Bob (1.0) rated m4 = 5, Carol (1.0) rated m4 = 4
        let predicted = engine.predict_rating("alice", "m4").unwrap();
        assert!((predicted - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_predict_rating_single_contributor_is_gated() {
        let mut engine = create_test_engine();
        // Only Bob rated m5 among Alice's neighbors, however high the value
        assert_eq!(engine.predict_rating("alice", "m5"), None);
    }

    #[test]
    fn test_predict_rating_unknown_user_is_none() {
        let mut engine = create_test_engine();
        assert_eq!(engine.predict_rating("nobody", "m4"), None);
    }

    #[test]
    fn test_predict_min_predicted_boundary_is_inclusive() {
        let mut engine = create_test_engine();
        engine.add_rating(rating("bob", "m4", 3.0));
        engine.add_rating(rating("carol", "m4", 3.0));
        // Weighted average is exactly min_predicted
        assert_eq!(engine.predict_rating("alice", "m4"), Some(3.0));

        engine.add_rating(rating("bob", "m4", 2.0));
        // Average 2.5 falls below the gate
        assert_eq!(engine.predict_rating("alice", "m4"), None);
    }

    #[test]
    fn test_neighbors_at_exact_threshold_still_contribute() {
        // Identical co-rated vectors give similarity exactly 1.0; with the
        // floor raised to 1.0 the >= comparison must still admit them
        let config = RecommendConfig {
            min_threshold: 1.0,
            ..RecommendConfig::default()
        };
        let mut engine = CollaborativeFiltering::with_config(config);
        engine.add_user(user("alice", "Alice"));
        engine.add_user(user("bob", "Bob"));
        engine.add_user(user("carol", "Carol"));
        for id in ["m1", "m2", "m4"] {
            engine.add_movie(movie(id));
        }
        for (u, m, v) in [
            ("alice", "m1", 4.0),
            ("alice", "m2", 5.0),
            ("bob", "m1", 4.0),
            ("bob", "m2", 5.0),
            ("bob", "m4", 3.0),
            ("carol", "m1", 4.0),
            ("carol", "m2", 5.0),
            ("carol", "m4", 3.0),
        ] {
            engine.add_rating(rating(u, m, v));
        }

        assert_eq!(engine.find_similar_users("alice", None).len(), 2);
        assert_eq!(engine.predict_rating("alice", "m4"), Some(3.0));
    }

    #[test]
    fn test_predict_unrated_ignores_stored_rating() {
        let mut engine = create_test_engine();
        // Alice rated m1 herself; the model path still answers from neighbors
        assert_eq!(engine.predict_rating("alice", "m1"), Some(4.0));
        let model = engine.predict_unrated("alice", "m1").unwrap();
        assert!((model - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_prediction_within_scale() {
        let mut engine = create_test_engine();
        for movie_id in ["m1", "m2", "m3", "m4", "m5"] {
            if let Some(p) = engine.predict_rating("alice", movie_id) {
                assert!((0.0..=5.0).contains(&p));
            }
        }
    }

    // ==================== Recommendations ====================

    #[test]
    fn test_recommendations_exclude_rated_movies() {
        let mut engine = create_test_engine();
        let recs = engine.get_recommendations("alice", None);
        for rec in &recs {
            assert!(engine.store().rating_of("alice", &rec.movie.id).is_none());
        }
    }

    #[test]
    fn test_recommendations_content_and_reason() {
        let mut engine = create_test_engine();
        let recs = engine.get_recommendations("alice", None);

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].movie.id, "m4");
        assert!((recs[0].predicted_rating - 4.5).abs() < 1e-9);
        // avg sim 1.0, no penalty, bonus 0.1, clamped to 1.0
        assert!((recs[0].confidence - 1.0).abs() < 1e-9);
        assert_eq!(recs[0].reason, "Based on 2 similar users (Bob is 100.0% similar)");
    }

    #[test]
    fn test_recommendations_tie_broken_by_predicted_rating() {
        let mut engine = CollaborativeFiltering::new();
        engine.add_user(user("alice", "Alice"));
        engine.add_user(user("bob", "Bob"));
        engine.add_user(user("carol", "Carol"));
        for id in ["m1", "m2", "m4", "m5"] {
            engine.add_movie(movie(id));
        }
        for (u, m, v) in [
            ("alice", "m1", 4.0),
            ("alice", "m2", 5.0),
            ("bob", "m1", 4.0),
            ("bob", "m2", 5.0),
            ("bob", "m4", 5.0),
            ("bob", "m5", 4.0),
            ("carol", "m1", 4.0),
            ("carol", "m2", 5.0),
            ("carol", "m4", 4.0),
            ("carol", "m5", 3.0),
        ] {
            engine.add_rating(rating(u, m, v));
        }

        let recs = engine.get_recommendations("alice", None);
        assert_eq!(recs.len(), 2);
        // Equal confidence, so the higher predicted rating ranks first
        assert_eq!(recs[0].movie.id, "m4");
        assert_eq!(recs[1].movie.id, "m5");
        assert!(recs[0].predicted_rating > recs[1].predicted_rating);

        let top_only = engine.get_recommendations("alice", Some(1));
        assert_eq!(top_only.len(), 1);
        assert_eq!(top_only[0].movie.id, "m4");
    }

    #[test]
    fn test_recommendations_unknown_user_is_empty() {
        let mut engine = create_test_engine();
        assert!(engine.get_recommendations("nobody", None).is_empty());
    }

    #[test]
    fn test_recommendations_idempotent_without_mutation() {
        let mut engine = create_test_engine();
        let first = engine.get_recommendations("alice", None);
        let second = engine.get_recommendations("alice", None);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.movie.id, b.movie.id);
            assert_eq!(a.predicted_rating, b.predicted_rating);
            assert_eq!(a.confidence, b.confidence);
            assert_eq!(a.reason, b.reason);
        }
    }

    // ==================== Cache Invalidation ====================

    #[test]
    fn test_add_rating_invalidates_similarity_cache() {
        let mut engine = CollaborativeFiltering::new();
        engine.add_user(user("a", "A"));
        engine.add_user(user("b", "B"));
        for id in ["m1", "m2", "m3", "m4"] {
            engine.add_movie(movie(id));
        }
        for (u, m, v) in [
            ("a", "m1", 1.0),
            ("a", "m2", 3.0),
            ("a", "m3", 2.0),
            ("b", "m1", 2.0),
            ("b", "m2", 3.0),
            ("b", "m3", 5.0),
        ] {
            engine.add_rating(rating(u, m, v));
        }

        let before = engine.similarity("a", "b");
        assert!((before - 0.327_326_835_353_988_8).abs() < 1e-9);

        // A fourth co-rated movie changes the correlation
        engine.add_rating(rating("a", "m4", 5.0));
        engine.add_rating(rating("b", "m4", 5.0));
        let after = engine.similarity("a", "b");
        let expected = crate::similarity::pearson_correlation(
            &[1.0, 3.0, 2.0, 5.0],
            &[2.0, 3.0, 5.0, 5.0],
            2,
        );
        assert!((after - expected).abs() < 1e-12);
        assert!(after > before);
    }

    #[test]
    fn test_rerating_updates_prediction() {
        let mut engine = create_test_engine();
        assert_eq!(engine.predict_rating("alice", "m4"), Some(4.5));

        engine.add_rating(rating("carol", "m4", 5.0));
        assert_eq!(engine.predict_rating("alice", "m4"), Some(5.0));
    }

    // ==================== Confidence ====================

    #[test]
    fn test_confidence_score_requires_min_neighbors() {
        let config = RecommendConfig::default();
        assert_eq!(confidence_score(&[0.9], &config), 0.0);
        assert_eq!(confidence_score(&[], &config), 0.0);
    }

    #[test]
    fn test_confidence_score_at_threshold_floor() {
        let config = RecommendConfig::default();
        // avg exactly at the floor: no penalty, bonus 2 * 0.05
        let c = confidence_score(&[0.2, 0.2], &config);
        assert!((c - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_score_clamped_to_one() {
        let config = RecommendConfig::default();
        let c = confidence_score(&[1.0, 1.0, 1.0, 1.0], &config);
        assert_eq!(c, 1.0);
    }

    #[test]
    fn test_confidence_score_bonus_capped() {
        let config = RecommendConfig::default();
        // 10 contributors: bonus capped at 0.20, avg 0.5 with no penalty
        let sims = vec![0.5; 10];
        let c = confidence_score(&sims, &config);
        assert!((c - 0.7).abs() < 1e-9);
    }

    // ==================== Diagnostics ====================

    #[test]
    fn test_eligibility_for_connected_user() {
        let mut engine = create_test_engine();
        let eligibility = engine.can_user_receive_recommendations("alice");
        assert!(eligibility.can_receive);
        assert_eq!(eligibility.similar_users_count, 2);
        assert_eq!(
            eligibility.reason,
            "User has 2 similar users with sufficient similarity"
        );
    }

    #[test]
    fn test_quality_metrics_for_recommendable_movie() {
        let mut engine = create_test_engine();
        let metrics = engine.recommendation_quality_metrics("alice", "m4");

        assert!(metrics.has_similar_users);
        assert_eq!(metrics.similar_users_count, 2);
        assert!((metrics.average_similarity - 1.0).abs() < 1e-9);
        assert!((metrics.min_similarity - 1.0).abs() < 1e-9);
        assert!((metrics.max_similarity - 1.0).abs() < 1e-9);
        assert!(metrics.can_recommend);
    }

    #[test]
    fn test_quality_metrics_without_contributors() {
        let mut engine = create_test_engine();
        let metrics = engine.recommendation_quality_metrics("dave", "m1");

        assert!(!metrics.has_similar_users);
        assert_eq!(metrics.similar_users_count, 0);
        assert_eq!(metrics.average_similarity, 0.0);
        assert!(!metrics.can_recommend);
    }

    // ==================== Ingestion ====================

    #[test]
    fn test_try_add_rating_validation() {
        let mut engine = create_test_engine();

        assert!(matches!(
            engine.try_add_rating(rating("alice", "m1", 6.0)),
            Err(ValidationError::RatingOutOfRange { .. })
        ));
        assert!(matches!(
            engine.try_add_rating(rating("ghost", "m1", 3.0)),
            Err(ValidationError::UnknownUser(_))
        ));
        assert!(matches!(
            engine.try_add_rating(rating("alice", "ghost", 3.0)),
            Err(ValidationError::UnknownMovie(_))
        ));

        // Re-rating a known movie is an overwrite, not an error
        assert!(engine.try_add_rating(rating("alice", "m1", 2.0)).is_ok());
        assert_eq!(engine.store().rating_of("alice", "m1"), Some(2.0));
    }

    #[test]
    fn test_try_add_user_rejects_duplicates() {
        let mut engine = create_test_engine();
        assert!(matches!(
            engine.try_add_user(user("alice", "Alice Again")),
            Err(ValidationError::DuplicateId(_))
        ));
        assert!(engine.try_add_user(user("frank", "Frank")).is_ok());
    }

    // ==================== Method & Stats ====================

    #[test]
    fn test_cosine_method_engine() {
        let mut engine = CollaborativeFiltering::with_method(SimilarityMethod::Cosine);
        engine.add_user(user("a", "A"));
        engine.add_user(user("b", "B"));
        engine.add_movie(movie("m1"));
        engine.add_movie(movie("m2"));
        engine.add_rating(rating("a", "m1", 1.0));
        engine.add_rating(rating("a", "m2", 2.0));
        engine.add_rating(rating("b", "m1", 2.0));
        engine.add_rating(rating("b", "m2", 4.0));

        assert!((engine.similarity("a", "b") - 1.0).abs() < 1e-9);
        assert_eq!(engine.method(), SimilarityMethod::Cosine);
    }

    #[test]
    fn test_system_stats() {
        let engine = create_test_engine();
        let stats = engine.system_stats();

        assert_eq!(stats.num_users, 4);
        assert_eq!(stats.num_movies, 5);
        assert_eq!(stats.total_ratings, 13);
        assert!((stats.avg_ratings_per_user - 13.0 / 4.0).abs() < 1e-9);
        assert_eq!(stats.similarity_method, SimilarityMethod::Pearson);
    }
}
