use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::models::{GenreList, Movie, MovieId, MoviePage};

pub const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const DETAIL_APPENDS: &str = "credits,videos,similar,reviews";

#[derive(Debug, thiserror::Error)]
pub enum TmdbError {
    #[error("TMDB error: {status}")]
    Http { status: u16, body: String },
    #[error("TMDB request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("TMDB response could not be parsed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl TmdbError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TmdbError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type TmdbResult<T> = Result<T, TmdbError>;

/// Ordering for `/discover/movie` genre listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenreSort {
    #[default]
    Popularity,
    ReleaseDate,
    Rating,
}

impl GenreSort {
    pub fn as_query(&self) -> &'static str {
        match self {
            GenreSort::Popularity => "popularity.desc",
            GenreSort::ReleaseDate => "primary_release_date.desc",
            GenreSort::Rating => "vote_average.desc",
        }
    }
}

impl FromStr for GenreSort {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "popularity" => Ok(GenreSort::Popularity),
            "release-date" | "release_date" => Ok(GenreSort::ReleaseDate),
            "rating" => Ok(GenreSort::Rating),
            _ => Err(anyhow::anyhow!(
                "sort must be 'popularity', 'release-date' or 'rating'"
            )),
        }
    }
}

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn popular(&self, page: u32) -> TmdbResult<MoviePage>;
    async fn top_rated(&self, page: u32) -> TmdbResult<MoviePage>;
    async fn upcoming(&self, page: u32) -> TmdbResult<MoviePage>;
    async fn search(&self, query: &str, page: u32) -> TmdbResult<MoviePage>;
    async fn genres(&self) -> TmdbResult<GenreList>;
    async fn movies_by_genre(
        &self,
        genre_id: i64,
        page: u32,
        sort: GenreSort,
    ) -> TmdbResult<MoviePage>;
    async fn movie_details(&self, id: MovieId) -> TmdbResult<Movie>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>) -> TmdbResult<Self> {
        Self::with_base_url(api_key, TMDB_BASE)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> TmdbResult<Self> {
        let user_agent = format!("cinescope/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let api_key = config.require_api_key()?;
        Ok(Self::with_base_url(api_key, &config.tmdb_base_url)?)
    }

    /// Raw JSON for any endpoint; used by the debugging binary.
    pub async fn raw(
        &self,
        endpoint: &str,
        params: &[(&str, Option<String>)],
    ) -> TmdbResult<serde_json::Value> {
        self.request(endpoint, params).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, Option<String>)],
    ) -> TmdbResult<T> {
        let url = compose_url(&self.base_url, &self.api_key, endpoint, params);
        debug!(endpoint, "TMDB GET");
        let res = self.client.get(&url).send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(TmdbError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn list(&self, endpoint: &str, page: u32) -> TmdbResult<MoviePage> {
        self.request(endpoint, &[("page", Some(page.max(1).to_string()))])
            .await
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn popular(&self, page: u32) -> TmdbResult<MoviePage> {
        self.list("/movie/popular", page).await
    }

    async fn top_rated(&self, page: u32) -> TmdbResult<MoviePage> {
        self.list("/movie/top_rated", page).await
    }

    async fn upcoming(&self, page: u32) -> TmdbResult<MoviePage> {
        self.list("/movie/upcoming", page).await
    }

    async fn search(&self, query: &str, page: u32) -> TmdbResult<MoviePage> {
        self.request(
            "/search/movie",
            &[
                ("query", Some(query.to_string())),
                ("page", Some(page.max(1).to_string())),
                ("include_adult", Some("false".to_string())),
            ],
        )
        .await
    }

    async fn genres(&self) -> TmdbResult<GenreList> {
        self.request("/genre/movie/list", &[("language", Some("en-US".to_string()))])
            .await
    }

    async fn movies_by_genre(
        &self,
        genre_id: i64,
        page: u32,
        sort: GenreSort,
    ) -> TmdbResult<MoviePage> {
        self.request(
            "/discover/movie",
            &[
                ("with_genres", Some(genre_id.to_string())),
                ("page", Some(page.max(1).to_string())),
                ("sort_by", Some(sort.as_query().to_string())),
                ("include_adult", Some("false".to_string())),
            ],
        )
        .await
    }

    async fn movie_details(&self, id: MovieId) -> TmdbResult<Movie> {
        let endpoint = format!("/movie/{id}");
        self.request(
            &endpoint,
            &[
                ("append_to_response", Some(DETAIL_APPENDS.to_string())),
                ("language", Some("en-US".to_string())),
            ],
        )
        .await
    }
}

/// Builds `base + endpoint` with the api key first and every present parameter encoded.
pub fn compose_url(
    base: &str,
    api_key: &str,
    endpoint: &str,
    params: &[(&str, Option<String>)],
) -> String {
    let mut url = format!("{base}{endpoint}?api_key={}", urlencoding::encode(api_key));
    for (key, value) in params {
        if let Some(value) = value {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
    }
    url
}

pub fn parse_tmdb_id(input: &str) -> Option<MovieId> {
    let trimmed = input.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.parse().ok();
    }
    None
}
