use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub type MovieId = i64;

/// A single film as delivered by TMDB. Only the fields the favorites store and the
/// list views read are typed; everything else rides along in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: MovieId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<u64>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Movie {
    pub fn new(id: MovieId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Self::default()
        }
    }

    /// TMDB ids are positive; a zero id means the field was missing or null.
    pub fn has_valid_id(&self) -> bool {
        self.id > 0
    }

    pub fn rating(&self) -> f64 {
        self.vote_average.unwrap_or(0.0)
    }

    pub fn votes(&self) -> u64 {
        self.vote_count.unwrap_or(0)
    }

    /// Leading year of `release_date`, tolerating partial dates like "2024" or "2024-05".
    pub fn release_year(&self) -> Option<i32> {
        let date = self.release_date.as_deref()?.trim();
        if let Some(parsed) = self.parsed_release_date() {
            return Some(parsed.year());
        }
        date.split('-').next()?.parse().ok()
    }

    pub fn parsed_release_date(&self) -> Option<NaiveDate> {
        let date = self.release_date.as_deref()?.trim();
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }

    /// Videos attached by `append_to_response=videos`, if any.
    pub fn videos(&self) -> Vec<Video> {
        self.extra
            .get("videos")
            .cloned()
            .and_then(|v| serde_json::from_value::<VideoList>(v).ok())
            .map(|list| list.results)
            .unwrap_or_default()
    }

    pub fn genre_names(&self) -> Vec<String> {
        self.extra
            .get("genres")
            .cloned()
            .and_then(|v| serde_json::from_value::<Vec<Genre>>(v).ok())
            .map(|genres| genres.into_iter().map(|g| g.name).collect())
            .unwrap_or_default()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenreList {
    #[serde(default)]
    pub genres: Vec<Genre>,
}

/// Envelope shared by every movie-list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoviePage {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<Movie>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u64,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Video {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub site: String,
    #[serde(rename = "type", default)]
    pub video_type: String,
}

#[derive(Debug, Deserialize)]
struct VideoList {
    #[serde(default)]
    results: Vec<Video>,
}
