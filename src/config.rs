//! Engine Configuration
//!
//! All thresholds the engine gates on, with production defaults. A single
//! config value is shared by the similarity, prediction, and recommendation
//! stages so the gates stay consistent across them.

use serde::{Deserialize, Serialize};

/// Recommendation engine thresholds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    // Core similarity thresholds
    /// Minimum similarity for a neighbor to contribute (20%)
    pub min_threshold: f64,
    /// Minimum co-rated movies between two users for a reliable similarity
    pub min_common_ratings: usize,
    /// Minimum qualifying neighbors needed for a prediction
    pub min_similar_users: usize,

    // Rating thresholds
    /// Minimum predicted rating worth recommending (1-5 scale)
    pub min_predicted: f64,
    /// Rating scale upper bound
    pub rating_scale: f64,

    // Performance and quality settings
    /// Maximum neighbors to consider per query
    pub max_similar_users: usize,
    /// Maximum recommendations to generate
    pub max_recommendations: usize,
    /// Minimum confidence for a recommendation to surface
    pub confidence_threshold: f64,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            min_threshold: 0.2,
            min_common_ratings: 2,
            min_similar_users: 2,
            min_predicted: 3.0,
            rating_scale: 5.0,
            max_similar_users: 50,
            max_recommendations: 16,
            confidence_threshold: 0.4,
        }
    }
}

impl RecommendConfig {
    /// Parse a config from JSON; missing fields fall back to defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize the config to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Whether a similarity score clears the contribution threshold
    pub fn meets_similarity_threshold(&self, similarity: f64) -> bool {
        similarity >= self.min_threshold
    }

    /// Whether a predicted rating clears the recommendation threshold
    pub fn meets_predicted_threshold(&self, rating: f64) -> bool {
        rating >= self.min_predicted
    }

    /// Whether a neighbor count is enough to support a prediction
    pub fn has_enough_neighbors(&self, count: usize) -> bool {
        count >= self.min_similar_users
    }
}
