use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::browse::{filter_by_title_prefix, HomeSections, MovieFeed};
use crate::config::Config;
use crate::favorites::{FavoriteSort, FavoritesStore, FileStorage, Toggle};
use crate::models::{Movie, MovieId, MoviePage};
use crate::tmdb::{GenreSort, TmdbApi, TmdbClient, TmdbResult};
use crate::utils;

/// Browse TMDB movies and keep a local list of favorites.
#[derive(Parser, Debug)]
#[command(name = "cinescope", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the favorites storage file.
    #[arg(long, global = true, env = "CINESCOPE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Popular movies.
    Popular {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Top rated movies.
    TopRated {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Upcoming releases.
    Upcoming {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Popular, top rated and upcoming at once.
    Home,
    /// Search movies by title.
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Only keep results whose title starts with the query.
        #[arg(long)]
        prefix: bool,
    },
    /// List movie genres.
    Genres,
    /// Movies of one genre, optionally several pages deep.
    Genre {
        id: i64,
        #[arg(long, default_value_t = 1)]
        pages: u32,
        #[arg(long, default_value = "popularity")]
        sort: GenreSort,
    },
    /// Full details for one movie.
    Details { id: MovieId },
    #[command(subcommand)]
    Favorites(FavoritesCommand),
}

#[derive(Subcommand, Debug)]
pub enum FavoritesCommand {
    /// Show saved favorites.
    List {
        #[arg(long, default_value = "added")]
        sort: FavoriteSort,
        /// Only titles containing this text.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Fetch a movie and add it to favorites.
    Add { id: MovieId },
    Remove { id: MovieId },
    Toggle { id: MovieId },
    /// Remove every favorite after confirmation.
    Clear {
        #[arg(long)]
        yes: bool,
    },
    Stats,
}

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let config = config.with_data_dir(cli.data_dir);
    let storage = Arc::new(FileStorage::new(config.storage_path()));
    info!("Using favorites storage at {}", storage.path().display());
    let store = FavoritesStore::new(storage);
    let _subscription = store.subscribe(|snap| {
        debug!(
            count = snap.favorites.len(),
            error = ?snap.error,
            "Favorites changed"
        );
    });
    report_store_error(&store);

    match cli.command {
        Command::Favorites(cmd) => run_favorites(cmd, &store, &config).await?,
        other => {
            let api: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_config(&config)?);
            run_browse(other, api.as_ref(), &store).await?;
        }
    }

    report_store_error(&store);
    Ok(())
}

async fn run_browse(command: Command, api: &dyn TmdbApi, store: &FavoritesStore) -> Result<()> {
    match command {
        Command::Popular { page } => print_page("Popular", api.popular(page).await, store)?,
        Command::TopRated { page } => print_page("Top rated", api.top_rated(page).await, store)?,
        Command::Upcoming { page } => print_page("Upcoming", api.upcoming(page).await, store)?,
        Command::Home => {
            let sections = HomeSections::load(api).await;
            if sections.all_failed() {
                anyhow::bail!("Failed to load movies");
            }
            for (title, section) in [
                ("Popular", sections.popular),
                ("Top rated", sections.top_rated),
                ("Upcoming", sections.upcoming),
            ] {
                match section {
                    Ok(page) => print_movies(title, &page.results.iter().collect::<Vec<_>>(), store),
                    Err(e) => println!("{title}: unavailable ({e})"),
                }
            }
        }
        Command::Search {
            query,
            page,
            prefix,
        } => {
            let query = query.trim();
            if query.is_empty() {
                anyhow::bail!("Search query is empty");
            }
            let results = api
                .search(query, page)
                .await
                .context("failed to search movie")?;
            let shown = if prefix {
                filter_by_title_prefix(&results.results, query)
            } else {
                results.results.iter().collect()
            };
            print_movies(&format!("Results for '{query}'"), &shown, store);
        }
        Command::Genres => {
            let list = api.genres().await.context("Failed to load genres")?;
            println!("{} genres", list.genres.len());
            for genre in list.genres {
                println!("{:>6}  {}", genre.id, genre.name);
            }
        }
        Command::Genre { id, pages, sort } => {
            let mut feed = MovieFeed::new();
            let first = api
                .movies_by_genre(id, 1, sort)
                .await
                .with_context(|| format!("Failed to load genre {id} movies"))?;
            feed.reset(first);
            while feed.has_more() && feed.page() < pages {
                let next = api
                    .movies_by_genre(id, feed.next_page(), sort)
                    .await
                    .with_context(|| format!("Failed to load genre {id} movies"))?;
                feed.append(next);
            }
            let label = if feed.len() == 1 { "movie" } else { "movies" };
            print_movies(
                &format!("Genre {id}: {} {label} loaded", feed.len()),
                &feed.movies().iter().collect::<Vec<_>>(),
                store,
            );
            if feed.has_more() {
                println!("(more available: --pages {})", feed.next_page());
            }
        }
        Command::Details { id } => {
            let movie = api
                .movie_details(id)
                .await
                .context("Failed to load movie details")?;
            print_details(&movie, store.is_favorite(movie.id));
        }
        Command::Favorites(_) => anyhow::bail!("favorites commands do not browse TMDB"),
    }
    Ok(())
}

async fn run_favorites(cmd: FavoritesCommand, store: &FavoritesStore, config: &Config) -> Result<()> {
    match cmd {
        FavoritesCommand::List { sort, filter } => {
            let list = match filter.as_deref() {
                Some(text) => {
                    let mut hits = store.filter_by_title(text);
                    crate::favorites::sort_movies(&mut hits, sort);
                    hits
                }
                None => store.sorted_favorites(sort),
            };
            if list.is_empty() {
                println!("No favorite movies yet");
                println!("Add your movies to favorites and they will appear here");
                return Ok(());
            }
            print_movies("Your Favorites", &list.iter().collect::<Vec<_>>(), store);
        }
        FavoritesCommand::Add { id } => {
            if store.is_favorite(id) {
                println!("Movie {id} is already a favorite");
                return Ok(());
            }
            let api = TmdbClient::from_config(config)?;
            let movie = api
                .movie_details(id)
                .await
                .context("Failed to load movie details")?;
            if store.add_to_favorites(&movie) {
                println!("Added '{}' to favorites", movie.title);
            } else {
                warn!("Movie {} was not added", id);
            }
        }
        FavoritesCommand::Remove { id } => {
            if store.remove_from_favorites(id) {
                println!("Removed movie {id} from favorites");
            } else {
                println!("Movie {id} is not a favorite");
            }
        }
        FavoritesCommand::Toggle { id } => {
            let movie = match store.favorites().into_iter().find(|m| m.id == id) {
                Some(existing) => existing,
                None => TmdbClient::from_config(config)?
                    .movie_details(id)
                    .await
                    .context("Failed to load movie details")?,
            };
            match store.toggle_favorite(&movie) {
                Toggle::Added => println!("Added '{}' to favorites", movie.title),
                Toggle::Removed => println!("Removed '{}' from favorites", movie.title),
                Toggle::Rejected => println!("Movie {id} could not be toggled"),
            }
        }
        FavoritesCommand::Clear { yes } => {
            let count = store.favorite_count();
            let cleared = store.clear_favorites(|| {
                yes || confirm("Are you sure you want to clear all favorites?")
            });
            if cleared {
                println!("Cleared {count} favorites");
            } else {
                println!("Favorites left unchanged");
            }
        }
        FavoritesCommand::Stats => {
            let stats = store.stats();
            println!("Favorites:      {}", stats.count);
            println!("Average rating: {:.1}", stats.average_rating);
            println!("Total votes:    {}", stats.total_votes);
            if let (Some(oldest), Some(newest)) = (stats.oldest_year, stats.newest_year) {
                println!("Years:          {oldest} - {newest}");
            }
        }
    }
    Ok(())
}

fn confirm(question: &str) -> bool {
    print!("{question} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn report_store_error(store: &FavoritesStore) {
    if let Some(err) = store.error() {
        warn!("{}", err);
        println!("warning: {err}. Run the command again to retry.");
    }
}

fn print_page(title: &str, page: TmdbResult<MoviePage>, store: &FavoritesStore) -> Result<()> {
    let page = page.context("Failed to load movies...")?;
    print_movies(
        &format!("{title} (page {} of {})", page.page, page.total_pages),
        &page.results.iter().collect::<Vec<_>>(),
        store,
    );
    Ok(())
}

fn print_movies(title: &str, movies: &[&Movie], store: &FavoritesStore) {
    println!("{title}");
    if movies.is_empty() {
        println!("  No movies found");
        return;
    }
    for movie in movies {
        let marker = if store.is_favorite(movie.id) { "*" } else { " " };
        println!(
            "{marker} {:>8}  {}  {:>4}  {}",
            movie.id,
            utils::display_year(movie),
            utils::format_rating(movie),
            movie.title
        );
    }
}

fn print_details(movie: &Movie, favorite: bool) {
    let heart = if favorite { " [favorite]" } else { "" };
    println!("{} ({}){heart}", movie.title, utils::display_year(movie));
    if let Some(tagline) = movie.extra.get("tagline").and_then(|t| t.as_str()) {
        if !tagline.is_empty() {
            println!("\"{tagline}\"");
        }
    }
    println!(
        "Rating: {}/10 ({} votes)",
        utils::format_rating(movie),
        movie.votes()
    );
    println!("Runtime: {}", utils::format_runtime(utils::extra_u64(movie, "runtime")));
    let genres = movie.genre_names();
    if !genres.is_empty() {
        println!("Genres: {}", genres.join(", "));
    }
    println!("Budget: {}", utils::format_currency(utils::extra_u64(movie, "budget")));
    println!("Revenue: {}", utils::format_currency(utils::extra_u64(movie, "revenue")));
    if let Some(poster) = utils::poster_url(movie) {
        println!("Poster: {poster}");
    }
    if let Some(backdrop) = utils::backdrop_url(movie) {
        println!("Backdrop: {backdrop}");
    }
    if let Some(trailer) = utils::pick_trailer(&movie.videos()) {
        println!("Trailer: {}", utils::youtube_url(trailer));
    }
    if let Some(overview) = movie.overview.as_deref().filter(|o| !o.is_empty()) {
        println!();
        println!("{overview}");
    }
}
