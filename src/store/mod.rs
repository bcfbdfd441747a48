//! Rating Store
//!
//! In-memory collection of users, movies, and ratings. Append-only from the
//! engine's point of view; the only in-place change is a re-rating, which
//! overwrites the existing value (last-write-wins) so dense vector
//! construction never sees duplicate (user, movie) entries.
//!
//! Users and movies get stable, insertion-order positional indices. Rating
//! vectors are dense over the movie positions with 0.0 as the "unrated"
//! sentinel; stored ratings are expected to be >= 1 so the sentinel stays
//! unambiguous.

use std::collections::HashMap;

use crate::types::{Movie, Rating, User};

/// Owner of all raw recommendation data
#[derive(Clone, Debug, Default)]
pub struct RatingStore {
    /// Users in insertion order
    users: Vec<User>,
    /// Movies in insertion order
    movies: Vec<Movie>,
    /// Ratings; at most one entry per (user, movie) pair
    ratings: Vec<Rating>,
    /// User id -> position in `users`
    user_index: HashMap<String, usize>,
    /// Movie id -> position in `movies`
    movie_index: HashMap<String, usize>,
    /// (user id, movie id) -> position in `ratings`
    rating_index: HashMap<(String, String), usize>,
}

impl RatingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Mutation ====================

    /// Add a user. A duplicate id replaces the stored record in place so
    /// positional indices stay stable.
    pub fn add_user(&mut self, user: User) {
        match self.user_index.get(&user.id) {
            Some(&pos) => self.users[pos] = user,
            None => {
                self.user_index.insert(user.id.clone(), self.users.len());
                self.users.push(user);
            }
        }
    }

    /// Add a movie. A duplicate id replaces the stored record in place.
    pub fn add_movie(&mut self, movie: Movie) {
        match self.movie_index.get(&movie.id) {
            Some(&pos) => self.movies[pos] = movie,
            None => {
                self.movie_index.insert(movie.id.clone(), self.movies.len());
                self.movies.push(movie);
            }
        }
    }

    /// Add a rating. A duplicate (user, movie) pair overwrites the stored
    /// value (last-write-wins).
    pub fn add_rating(&mut self, rating: Rating) {
        let key = (rating.user_id.clone(), rating.movie_id.clone());
        match self.rating_index.get(&key) {
            Some(&pos) => self.ratings[pos] = rating,
            None => {
                self.rating_index.insert(key, self.ratings.len());
                self.ratings.push(rating);
            }
        }
    }

    // ==================== Lookup ====================

    /// All users in insertion order
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// All movies in insertion order
    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    /// All stored ratings
    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn movie_count(&self) -> usize {
        self.movies.len()
    }

    pub fn rating_count(&self) -> usize {
        self.ratings.len()
    }

    /// Positional index of a user id
    pub fn user_position(&self, user_id: &str) -> Option<usize> {
        self.user_index.get(user_id).copied()
    }

    /// Positional index of a movie id
    pub fn movie_position(&self, movie_id: &str) -> Option<usize> {
        self.movie_index.get(movie_id).copied()
    }

    /// User record by id
    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.user_position(user_id).map(|pos| &self.users[pos])
    }

    /// Movie record by id
    pub fn movie(&self, movie_id: &str) -> Option<&Movie> {
        self.movie_position(movie_id).map(|pos| &self.movies[pos])
    }

    /// Stored rating value for a (user, movie) pair
    pub fn rating_of(&self, user_id: &str, movie_id: &str) -> Option<f64> {
        self.rating_index
            .get(&(user_id.to_string(), movie_id.to_string()))
            .map(|&pos| self.ratings[pos].rating)
    }

    /// All ratings by one user
    pub fn user_ratings(&self, user_id: &str) -> Vec<&Rating> {
        self.ratings
            .iter()
            .filter(|r| r.user_id == user_id)
            .collect()
    }

    /// Dense rating vector for a user, indexed by movie position, 0.0 at
    /// unrated positions. Unknown users get an all-zeros vector, not an
    /// error. Ratings referencing unknown movies are skipped.
    pub fn rating_vector(&self, user_id: &str) -> Vec<f64> {
        let mut vector = vec![0.0; self.movies.len()];
        for rating in self.ratings.iter().filter(|r| r.user_id == user_id) {
            if let Some(pos) = self.movie_position(&rating.movie_id) {
                vector[pos] = rating.rating;
            }
        }
        vector
    }
}
