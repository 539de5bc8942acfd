use std::collections::HashSet;
use tracing::warn;

use crate::models::{Movie, MoviePage};
use crate::tmdb::{TmdbApi, TmdbResult};

/// Movies accumulated across "load more" clicks for one listing.
#[derive(Debug, Clone, Default)]
pub struct MovieFeed {
    movies: Vec<Movie>,
    page: u32,
    total_pages: u32,
}

impl MovieFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts over from `first`, as when a different genre is picked.
    pub fn reset(&mut self, first: MoviePage) {
        self.movies.clear();
        self.page = 0;
        self.total_pages = 0;
        self.append(first);
    }

    pub fn append(&mut self, next: MoviePage) {
        let mut seen: HashSet<_> = self.movies.iter().map(|m| m.id).collect();
        self.movies
            .extend(next.results.into_iter().filter(|m| seen.insert(m.id)));
        self.page = next.page;
        self.total_pages = next.total_pages;
    }

    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn next_page(&self) -> u32 {
        self.page + 1
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }
}

/// The three landing-page rows, each with its own outcome.
pub struct HomeSections {
    pub popular: TmdbResult<MoviePage>,
    pub top_rated: TmdbResult<MoviePage>,
    pub upcoming: TmdbResult<MoviePage>,
}

impl HomeSections {
    /// Fetches all rows concurrently; returns once every request has settled.
    pub async fn load(api: &dyn TmdbApi) -> Self {
        let (popular, top_rated, upcoming) =
            tokio::join!(api.popular(1), api.top_rated(1), api.upcoming(1));
        for (name, result) in [
            ("popular", &popular),
            ("top rated", &top_rated),
            ("upcoming", &upcoming),
        ] {
            if let Err(e) = result {
                warn!("Failed to load {} movies: {}", name, e);
            }
        }
        Self {
            popular,
            top_rated,
            upcoming,
        }
    }

    pub fn all_failed(&self) -> bool {
        self.popular.is_err() && self.top_rated.is_err() && self.upcoming.is_err()
    }
}

/// Case-insensitive title prefix match used while typing in the search box.
pub fn filter_by_title_prefix<'a>(movies: &'a [Movie], query: &str) -> Vec<&'a Movie> {
    let prefix = query.trim().to_lowercase();
    movies
        .iter()
        .filter(|m| m.title.to_lowercase().starts_with(&prefix))
        .collect()
}
