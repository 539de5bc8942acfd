use std::cmp::Ordering;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, error, info, warn};

use super::storage::{KeyValueStore, StorageError};
use super::{decode_favorites, encode_favorites, validate_movie, FavoritesError};
use crate::models::{Movie, MovieId};

pub const FAVORITES_KEY: &str = "movie-favorites";
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load favorites";
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save favorites";

/// Read-only view handed to consumers and listeners.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FavoritesSnapshot {
    pub favorites: Vec<Movie>,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FavoriteSort {
    #[default]
    Added,
    Title,
    Rating,
    ReleaseDate,
}

impl FromStr for FavoriteSort {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "added" => Ok(FavoriteSort::Added),
            "title" => Ok(FavoriteSort::Title),
            "rating" => Ok(FavoriteSort::Rating),
            "release-date" | "release_date" | "date" => Ok(FavoriteSort::ReleaseDate),
            _ => Err(anyhow::anyhow!(
                "sort must be one of 'added', 'title', 'rating', 'release-date'"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FavoriteStats {
    pub count: usize,
    pub average_rating: f64,
    pub total_votes: u64,
    pub newest_year: Option<i32>,
    pub oldest_year: Option<i32>,
}

type Listener = Arc<dyn Fn(&FavoritesSnapshot) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

#[derive(Debug, Default)]
struct State {
    favorites: Vec<Movie>,
    is_loading: bool,
    error: Option<String>,
}

impl State {
    fn snapshot(&self) -> FavoritesSnapshot {
        FavoritesSnapshot {
            favorites: self.favorites.clone(),
            is_loading: self.is_loading,
            error: self.error.clone(),
        }
    }

    fn position(&self, id: MovieId) -> Option<usize> {
        self.favorites.iter().position(|m| m.id == id)
    }
}

/// Single source of truth for the user's favorite movies.
///
/// Construct once at startup and share the `Arc` with every consumer. All mutations go
/// through the internal state lock, which is also held across the write-back so that
/// persisted values land in the same order the mutations were made.
pub struct FavoritesStore {
    storage: Arc<dyn KeyValueStore>,
    state: Mutex<State>,
    listeners: Arc<Mutex<Listeners>>,
}

/// Keeps a listener registered; dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            let mut guard = listeners.lock().unwrap_or_else(PoisonError::into_inner);
            guard.entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl FavoritesStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Arc<Self> {
        let store = Arc::new(Self {
            storage,
            state: Mutex::new(State {
                is_loading: true,
                ..State::default()
            }),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        });
        store.initialize();
        store
    }

    fn initialize(&self) {
        let snapshot = {
            let mut state = self.lock_state();
            self.load_into(&mut state);
            state.snapshot()
        };
        self.notify(&snapshot);
    }

    /// Re-reads the backing store, replacing the in-memory list.
    ///
    /// The read and the assignment share one critical section, so a concurrent mutation
    /// lands either before the reload (and is part of what it reads) or after it.
    pub fn reload(&self) {
        let (loading, loaded) = {
            let mut state = self.lock_state();
            state.is_loading = true;
            state.error = None;
            let loading = state.snapshot();
            self.load_into(&mut state);
            (loading, state.snapshot())
        };
        self.notify(&loading);
        self.notify(&loaded);
    }

    fn load_into(&self, state: &mut State) {
        let (favorites, error) = self.load_persisted();
        state.favorites = favorites;
        state.error = error;
        state.is_loading = false;
        info!(count = state.favorites.len(), "Favorites loaded");
    }

    fn load_persisted(&self) -> (Vec<Movie>, Option<String>) {
        let raw = match self.storage.get(FAVORITES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return (Vec::new(), None),
            Err(StorageError::Format(e)) => {
                error!("Favorites storage is corrupt, discarding: {}", e);
                self.discard_corrupt();
                return (Vec::new(), Some(LOAD_FAILED_MESSAGE.to_string()));
            }
            Err(e) => {
                error!("Failed to read favorites from storage: {}", e);
                return (Vec::new(), Some(LOAD_FAILED_MESSAGE.to_string()));
            }
        };

        match decode_favorites(&raw) {
            Ok(list) => (sanitize(list), None),
            Err(FavoritesError::NotAList) => {
                warn!("Invalid favorites data in storage, resetting");
                self.discard_corrupt();
                (Vec::new(), None)
            }
            Err(e) => {
                error!("Failed to load favorites from storage: {}", e);
                self.discard_corrupt();
                (Vec::new(), Some(LOAD_FAILED_MESSAGE.to_string()))
            }
        }
    }

    fn discard_corrupt(&self) {
        if let Err(e) = self.storage.remove(FAVORITES_KEY) {
            warn!("Could not remove corrupt favorites entry: {}", e);
        }
    }

    pub fn snapshot(&self) -> FavoritesSnapshot {
        self.lock_state().snapshot()
    }

    pub fn favorites(&self) -> Vec<Movie> {
        self.lock_state().favorites.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock_state().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.lock_state().error.clone()
    }

    /// Appends `movie` unless it is invalid or already present. Returns whether the list changed.
    pub fn add_to_favorites(&self, movie: &Movie) -> bool {
        if let Err(e) = validate_movie(movie) {
            error!(title = %movie.title, "Rejected favorite: {}", e);
            return false;
        }
        self.mutate(|state| {
            if state.position(movie.id).is_some() {
                return false;
            }
            state.favorites.push(movie.clone());
            true
        })
    }

    pub fn remove_from_favorites(&self, movie_id: MovieId) -> bool {
        self.mutate(|state| match state.position(movie_id) {
            Some(idx) => {
                state.favorites.remove(idx);
                true
            }
            None => false,
        })
    }

    pub fn toggle_favorite(&self, movie: &Movie) -> Toggle {
        if let Err(e) = validate_movie(movie) {
            error!(title = %movie.title, "Rejected favorite toggle: {}", e);
            return Toggle::Rejected;
        }
        let mut outcome = Toggle::Rejected;
        self.mutate(|state| {
            outcome = match state.position(movie.id) {
                Some(idx) => {
                    state.favorites.remove(idx);
                    Toggle::Removed
                }
                None => {
                    state.favorites.push(movie.clone());
                    Toggle::Added
                }
            };
            true
        });
        outcome
    }

    /// Empties the list only when `confirm` answers yes. Returns whether it was cleared.
    pub fn clear_favorites(&self, confirm: impl FnOnce() -> bool) -> bool {
        if !confirm() {
            debug!("Clear favorites declined");
            return false;
        }
        self.mutate(|state| {
            state.favorites.clear();
            true
        })
    }

    pub fn is_favorite(&self, movie_id: MovieId) -> bool {
        self.lock_state().position(movie_id).is_some()
    }

    pub fn favorite_count(&self) -> usize {
        self.lock_state().favorites.len()
    }

    pub fn sorted_favorites(&self, sort: FavoriteSort) -> Vec<Movie> {
        let mut list = self.favorites();
        sort_movies(&mut list, sort);
        list
    }

    /// Case-insensitive title substring match, in insertion order.
    pub fn filter_by_title(&self, query: &str) -> Vec<Movie> {
        let needle = query.trim().to_lowercase();
        self.lock_state()
            .favorites
            .iter()
            .filter(|m| needle.is_empty() || m.title.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> FavoriteStats {
        let state = self.lock_state();
        let list = &state.favorites;
        if list.is_empty() {
            return FavoriteStats::default();
        }
        let rating_sum: f64 = list.iter().map(Movie::rating).sum();
        let years = list.iter().filter_map(Movie::release_year);
        FavoriteStats {
            count: list.len(),
            average_rating: rating_sum / list.len() as f64,
            total_votes: list.iter().map(Movie::votes).sum(),
            newest_year: years.clone().max(),
            oldest_year: years.min(),
        }
    }

    /// Registers `listener` to run after every state change until the returned guard drops.
    ///
    /// A panicking listener is logged and skipped; the mutation that triggered it still
    /// completes and later listeners still run.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&FavoritesSnapshot) + Send + Sync + 'static,
    {
        let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        guard.next_id += 1;
        let id = guard.next_id;
        guard.entries.push((id, Arc::new(listener)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Applies `change`, persists if it reports a change, then notifies listeners.
    fn mutate<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut State) -> bool,
    {
        let snapshot = {
            let mut state = self.lock_state();
            if !change(&mut *state) {
                return false;
            }
            self.persist(&mut *state);
            state.snapshot()
        };
        self.notify(&snapshot);
        true
    }

    fn persist(&self, state: &mut State) {
        let result = encode_favorites(&state.favorites).and_then(|body| {
            self.storage
                .set(FAVORITES_KEY, &body)
                .map_err(FavoritesError::from)
        });
        match result {
            Ok(()) => {
                if state.error.as_deref() == Some(SAVE_FAILED_MESSAGE) {
                    state.error = None;
                }
                debug!(count = state.favorites.len(), "Favorites saved");
            }
            Err(e) => {
                error!("Failed to save favorites to storage: {}", e);
                state.error = Some(SAVE_FAILED_MESSAGE.to_string());
            }
        }
    }

    fn notify(&self, snapshot: &FavoritesSnapshot) {
        let listeners: Vec<Listener> = {
            let guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            guard.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
                error!("Favorites listener panicked");
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drops entries without a usable id and later duplicates of an id.
fn sanitize(list: Vec<Movie>) -> Vec<Movie> {
    let mut seen = HashSet::new();
    let before = list.len();
    let kept: Vec<Movie> = list
        .into_iter()
        .filter(|m| m.has_valid_id() && seen.insert(m.id))
        .collect();
    if kept.len() != before {
        warn!(
            dropped = before - kept.len(),
            "Dropped invalid or duplicate persisted favorites"
        );
    }
    kept
}

pub(crate) fn sort_movies(list: &mut [Movie], sort: FavoriteSort) {
    match sort {
        FavoriteSort::Added => {}
        FavoriteSort::Title => {
            list.sort_by_key(|m| m.title.to_lowercase());
        }
        FavoriteSort::Rating => {
            list.sort_by(|a, b| b.rating().partial_cmp(&a.rating()).unwrap_or(Ordering::Equal));
        }
        FavoriteSort::ReleaseDate => {
            list.sort_by(|a, b| match (a.parsed_release_date(), b.parsed_release_date()) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }
    }
}
