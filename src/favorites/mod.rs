//! Persisted list of favorite movies shared by every view of the application.

mod storage;
mod store;

pub use storage::{FileStorage, KeyValueStore, MemoryStorage, StorageError};
pub(crate) use store::sort_movies;
pub use store::{
    FavoriteSort, FavoriteStats, FavoritesSnapshot, FavoritesStore, Subscription, Toggle,
    FAVORITES_KEY, LOAD_FAILED_MESSAGE, SAVE_FAILED_MESSAGE,
};

use serde_json::Value;
use tracing::warn;

use crate::models::Movie;

#[derive(Debug, thiserror::Error)]
pub enum FavoritesError {
    #[error("movie has no usable id")]
    InvalidMovie,
    #[error("persisted favorites are not a list")]
    NotAList,
    #[error("persisted favorites are malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Rejects movies the store cannot key on.
pub fn validate_movie(movie: &Movie) -> Result<(), FavoritesError> {
    if movie.has_valid_id() {
        Ok(())
    } else {
        Err(FavoritesError::InvalidMovie)
    }
}

/// Decodes the persisted value, accepting only a top-level JSON array.
///
/// Elements that do not decode as a movie are dropped one by one so the rest of the
/// list survives.
pub fn decode_favorites(raw: &str) -> Result<Vec<Movie>, FavoritesError> {
    let Value::Array(items) = serde_json::from_str::<Value>(raw)? else {
        return Err(FavoritesError::NotAList);
    };
    let mut movies = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Movie>(item) {
            Ok(movie) => movies.push(movie),
            Err(e) => warn!(index = idx, "Dropped undecodable persisted favorite: {}", e),
        }
    }
    Ok(movies)
}

pub fn encode_favorites(favorites: &[Movie]) -> Result<String, FavoritesError> {
    Ok(serde_json::to_string(favorites)?)
}
