use crate::models::{Movie, Video};

const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

pub const POSTER_SIZE: &str = "w500";
pub const BACKDROP_SIZE: &str = "original";
pub const THUMB_SIZE: &str = "w200";

pub fn image_url(path: Option<&str>, size: &str) -> Option<String> {
    let path = path.filter(|p| !p.is_empty())?;
    Some(format!("{IMAGE_BASE}/{size}{path}"))
}

pub fn poster_url(movie: &Movie) -> Option<String> {
    image_url(movie.poster_path.as_deref(), POSTER_SIZE)
}

pub fn backdrop_url(movie: &Movie) -> Option<String> {
    image_url(movie.backdrop_path.as_deref(), BACKDROP_SIZE)
}

pub fn format_runtime(minutes: Option<u64>) -> String {
    match minutes {
        Some(m) if m > 0 => format!("{}h {}m", m / 60, m % 60),
        _ => "N/A".to_string(),
    }
}

/// Whole US dollars with thousands separators; zero or missing is "N/A".
pub fn format_currency(amount: Option<u64>) -> String {
    let Some(amount) = amount.filter(|a| *a > 0) else {
        return "N/A".to_string();
    };
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    format!("${out}")
}

pub fn format_rating(movie: &Movie) -> String {
    format!("{:.1}", movie.rating())
}

pub fn display_year(movie: &Movie) -> String {
    movie
        .release_year()
        .map(|y| y.to_string())
        .unwrap_or_else(|| "----".to_string())
}

/// First YouTube trailer, else whatever video comes first.
pub fn pick_trailer(videos: &[Video]) -> Option<&Video> {
    videos
        .iter()
        .find(|v| v.video_type == "Trailer" && v.site.eq_ignore_ascii_case("YouTube"))
        .or_else(|| videos.first())
}

pub fn youtube_url(video: &Video) -> String {
    format!("https://www.youtube.com/watch?v={}", video.key)
}

pub fn extra_u64(movie: &Movie, field: &str) -> Option<u64> {
    movie.extra.get(field).and_then(serde_json::Value::as_u64)
}
