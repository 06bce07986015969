mod display;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indexer::{CategoricalAttribute, IndexBuilder, IndexConfig, NumericField};
use query::{QueryConfig, QueryExecutor};
use rand::Rng;
use record_store::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// movie-index - secondary indexes and queries over movie records
#[derive(Parser)]
#[command(name = "movie-index")]
#[command(about = "Build secondary indexes over movie records and query them", long_about = None)]
struct Cli {
    /// JSON-lines file with one movie record per line
    #[arg(short, long, default_value = "data/movies.jsonl")]
    data: PathBuf,

    /// Maximum number of records to index
    #[arg(long, default_value = "5000")]
    max_records: usize,

    /// Keys per page when scanning records
    #[arg(long, default_value = "1000")]
    page_size: usize,

    /// Keys per batch fetch
    #[arg(long, default_value = "500")]
    batch_size: usize,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the indexes and print a per-namespace summary
    Rebuild,

    /// List records in one categorical bucket
    Lookup {
        /// genre, actor, director, year, language or country
        attribute: CategoricalAttribute,
        value: String,
    },

    /// Records matching every attribute=value predicate
    Intersect {
        /// e.g. genre=Drama actor="Tom Hanks"
        #[arg(required = true, value_parser = parse_predicate)]
        predicates: Vec<(CategoricalAttribute, String)>,
    },

    /// Size of one categorical bucket
    Count {
        attribute: CategoricalAttribute,
        value: String,
    },

    /// Records with a numeric field within [min, max]
    Range {
        /// rating, external_rating, budget, revenue, runtime, popularity or vote_count
        field: NumericField,
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        min: f64,
        #[arg(long, default_value = "inf")]
        max: f64,
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Highest-rated records in a genre
    Top {
        genre: String,
        #[arg(short, default_value = "10")]
        k: usize,
        /// Restrict to a second bucket, e.g. year=1994
        #[arg(long = "where", value_parser = parse_predicate)]
        filter: Option<(CategoricalAttribute, String)>,
    },

    /// Compound queries refined after fetching
    #[command(subcommand)]
    Find(FindCommand),

    /// Group-by aggregations
    #[command(subcommand)]
    Stats(StatsCommand),

    /// Run concurrent queries and report latencies
    Benchmark {
        /// Number of queries to run
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Maximum queries in flight
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

#[derive(Subcommand)]
enum FindCommand {
    /// Revenue above a multiple of budget, by ROI
    Profitable {
        #[arg(long, default_value = "1000000")]
        min_budget: f64,
        #[arg(long, default_value = "3")]
        multiplier: f64,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Popular releases since a year, by popularity
    PopularRecent {
        #[arg(long, default_value = "2010")]
        year_from: i32,
        #[arg(long, default_value = "20")]
        min_popularity: f64,
        #[arg(long, default_value = "1000")]
        min_votes: f64,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Long and well rated, by rating then runtime
    LongHighRated {
        #[arg(long, default_value = "150")]
        min_runtime: f64,
        #[arg(long, default_value = "7.5")]
        min_rating: f64,
        #[arg(long, default_value = "2000")]
        year_from: i32,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// High budget and revenue in one language, by revenue
    Blockbusters {
        #[arg(long, default_value = "en")]
        language: String,
        #[arg(long, default_value = "50000000")]
        min_budget: f64,
        #[arg(long, default_value = "100000000")]
        min_revenue: f64,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Carrying several of the given genres, by rating
    MultiGenre {
        #[arg(required = true)]
        genres: Vec<String>,
        #[arg(long, default_value = "7")]
        min_rating: f64,
        #[arg(long, default_value = "3")]
        min_matches: usize,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Genre, country and language at once, by rating
    GenreCountryLanguage {
        genre: String,
        country: String,
        language: String,
        #[arg(long, default_value = "2010")]
        year_from: i32,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Big-budget movies that made money, by profit
    BudgetProfit {
        #[arg(long, default_value = "100000000")]
        min_budget: f64,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum StatsCommand {
    /// Number of movies per release year
    PerYear,
    /// Rating statistics per genre
    GenreRatings,
    /// Actors with the most movies
    TopActors {
        #[arg(long, default_value = "20")]
        top_n: usize,
        #[arg(long, default_value = "3")]
        min_movies: usize,
    },
    /// Yearly averages and high-rated counts
    Trends {
        #[arg(long, default_value = "1990")]
        year_from: i32,
        #[arg(long, default_value = "7")]
        high_rating: f64,
    },
    /// Most frequent exact genre sets
    GenreCombos {
        #[arg(long, default_value = "3")]
        min_support: usize,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

/// Parse `attribute=value`
fn parse_predicate(raw: &str) -> std::result::Result<(CategoricalAttribute, String), String> {
    let (attr, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected attribute=value, got '{}'", raw))?;
    let attr = attr.trim().parse::<CategoricalAttribute>().map_err(|e| e.to_string())?;
    Ok((attr, value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // The store lives in memory, so every run loads and indexes the dataset.
    println!("Loading movie records from {}...", cli.data.display());
    let start = Instant::now();
    let store = Arc::new(MemoryStore::new());
    let loaded = indexer::ingest::load_json_lines_file(&*store, &cli.data, "movie:")
        .with_context(|| format!("Failed to load {}", cli.data.display()))?;
    println!(
        "{} Loaded {} records ({} skipped) in {:?}",
        "✓".green(),
        loaded.loaded,
        loaded.skipped,
        start.elapsed()
    );

    let builder = IndexBuilder::new(store.clone()).with_config(
        IndexConfig::default()
            .with_max_records(cli.max_records)
            .with_page_size(cli.page_size),
    );
    let report = builder.rebuild().context("Index rebuild failed")?;
    println!(
        "{} Indexed {} records ({} skipped) in {:?}",
        "✓".green(),
        report.processed,
        report.skipped,
        report.elapsed
    );

    let executor = QueryExecutor::with_config(
        store,
        QueryConfig::default().with_batch_size(cli.batch_size),
    );
    let json = cli.json;

    match cli.command {
        Commands::Rebuild => display::print_rebuild(&report),
        Commands::Lookup { attribute, value } => {
            let keys = executor.lookup(attribute, &value)?;
            let movies = executor.fetch(&keys)?;
            display::print_movies(&format!("{}: {}", attribute, value), &movies, usize::MAX, json)?;
        }
        Commands::Intersect { predicates } => {
            let borrowed: Vec<(CategoricalAttribute, &str)> =
                predicates.iter().map(|(attr, value)| (*attr, value.as_str())).collect();
            let keys = executor.intersect(&borrowed)?;
            let movies = executor.fetch(&keys)?;
            let label = predicates
                .iter()
                .map(|(attr, value)| format!("{}={}", attr, value))
                .collect::<Vec<_>>()
                .join(" AND ");
            display::print_movies(&label, &movies, usize::MAX, json)?;
        }
        Commands::Count { attribute, value } => {
            let count = executor.cardinality(attribute, &value)?;
            println!("{} {}:{} = {}", "•".cyan(), attribute, value, count.to_string().bold());
        }
        Commands::Range { field, min, max, limit } => {
            let ranked = executor.range(field, min, max)?;
            display::print_ranked(&executor, &format!("{} in [{}, {}]", field, min, max), &ranked, limit, json)?;
        }
        Commands::Top { genre, k, filter } => {
            let (label, ranked) = match filter {
                Some((attr, value)) => (
                    format!("Top {} {} where {}={}", k, genre, attr, value),
                    executor.top_in_genre_where(&genre, attr, &value, k)?,
                ),
                None => (format!("Top {} {}", k, genre), executor.top_in_genre(&genre, k)?),
            };
            display::print_ranked(&executor, &label, &ranked, k, json)?;
        }
        Commands::Find(find) => handle_find(&executor, find, json)?,
        Commands::Stats(stats) => handle_stats(&executor, stats, json)?,
        Commands::Benchmark { requests, concurrent } => {
            handle_benchmark(executor, requests, concurrent).await?
        }
    }

    Ok(())
}

/// Handle the 'find' commands
fn handle_find(executor: &QueryExecutor<MemoryStore>, command: FindCommand, json: bool) -> Result<()> {
    let (label, movies, limit) = match command {
        FindCommand::Profitable { min_budget, multiplier, limit } => (
            format!("Revenue above {}x budget", multiplier),
            executor.profitable(min_budget, multiplier)?,
            limit,
        ),
        FindCommand::PopularRecent { year_from, min_popularity, min_votes, limit } => (
            format!("Popular since {}", year_from),
            executor.popular_recent(year_from, min_popularity, min_votes)?,
            limit,
        ),
        FindCommand::LongHighRated { min_runtime, min_rating, year_from, limit } => (
            format!("Over {} minutes, rated {}+", min_runtime, min_rating),
            executor.long_high_rated(min_runtime, min_rating, year_from)?,
            limit,
        ),
        FindCommand::Blockbusters { language, min_budget, min_revenue, limit } => (
            format!("Blockbusters in '{}'", language),
            executor.language_blockbusters(&language, min_budget, min_revenue)?,
            limit,
        ),
        FindCommand::MultiGenre { genres, min_rating, min_matches, limit } => (
            format!("{} of [{}]", min_matches, genres.join(", ")),
            executor.multi_genre(&genres, min_rating, min_matches)?,
            limit,
        ),
        FindCommand::GenreCountryLanguage { genre, country, language, year_from, limit } => (
            format!("{} from {} in '{}' since {}", genre, country, language, year_from),
            executor.genre_country_language(&genre, &country, &language, year_from)?,
            limit,
        ),
        FindCommand::BudgetProfit { min_budget, limit } => (
            format!("Profitable with budget over {}", min_budget),
            executor.high_budget_profit(min_budget)?,
            limit,
        ),
    };
    display::print_movies(&label, &movies, limit, json)
}

/// Handle the 'stats' commands
fn handle_stats(executor: &QueryExecutor<MemoryStore>, command: StatsCommand, json: bool) -> Result<()> {
    match command {
        StatsCommand::PerYear => display::print_years(&executor.movies_per_year()?, json),
        StatsCommand::GenreRatings => display::print_genre_ratings(&executor.rating_by_genre()?, json),
        StatsCommand::TopActors { top_n, min_movies } => {
            display::print_actors(&executor.top_actors(top_n, min_movies)?, json)
        }
        StatsCommand::Trends { year_from, high_rating } => {
            display::print_trends(&executor.yearly_trends(year_from, high_rating)?, json)
        }
        StatsCommand::GenreCombos { min_support, limit } => {
            let mut rows = executor.genre_combinations(min_support)?;
            rows.truncate(limit);
            display::print_combinations(&rows, json)
        }
    }
}

/// One query of the benchmark mix
#[derive(Debug, Clone)]
enum Probe {
    Lookup(String),
    Top(String),
    TopInYear(String, String),
    Range(f64),
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    executor: QueryExecutor<MemoryStore>,
    requests: usize,
    concurrent: usize,
) -> Result<()> {
    if requests == 0 {
        return Err(anyhow!("benchmark needs at least one request"));
    }

    // Draw probe arguments from values that actually exist
    let genres: Vec<String> = executor
        .rating_by_genre()?
        .into_iter()
        .map(|row| row.genre)
        .collect();
    let years: Vec<String> = executor
        .movies_per_year()?
        .into_iter()
        .map(|row| row.year.to_string())
        .collect();
    if genres.is_empty() || years.is_empty() {
        return Err(anyhow!("dataset has no rated genres or years to probe"));
    }

    let mut rng = rand::rng();
    let probes: Vec<Probe> = (0..requests)
        .map(|_| {
            let genre = genres[rng.random_range(0..genres.len())].clone();
            match rng.random_range(0..4) {
                0 => Probe::Lookup(genre),
                1 => Probe::Top(genre),
                2 => Probe::TopInYear(genre, years[rng.random_range(0..years.len())].clone()),
                _ => Probe::Range(rng.random_range(5.0..9.0)),
            }
        })
        .collect();

    // Queries are synchronous, so each runs on the blocking pool
    let permits = Arc::new(Semaphore::new(concurrent.max(1)));
    let wall = Instant::now();
    let mut handles = vec![];
    for probe in probes {
        let executor = executor.clone();
        let permits = Arc::clone(&permits);
        handles.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            tokio::task::spawn_blocking(move || {
                let start = Instant::now();
                let hits = match &probe {
                    Probe::Lookup(genre) => executor.lookup(CategoricalAttribute::Genre, genre)?.len(),
                    Probe::Top(genre) => executor.top_in_genre(genre, 10)?.len(),
                    Probe::TopInYear(genre, year) => executor
                        .top_in_genre_where(genre, CategoricalAttribute::Year, year, 10)?
                        .len(),
                    Probe::Range(min) => executor.count_in_range(NumericField::Rating, *min, f64::INFINITY)?,
                };
                tracing::debug!("{:?} -> {} hits", probe, hits);
                Ok::<_, anyhow::Error>(start.elapsed())
            })
            .await
            .context("Benchmark query panicked")?
        }));
    }

    let mut timings: Vec<Duration> = Vec::with_capacity(handles.len());
    for handle in handles {
        timings.push(handle.await??);
    }
    let total_time = wall.elapsed();

    timings.sort();
    let busy: Duration = timings.iter().sum();
    let avg_latency = busy / (timings.len() as u32);
    let percentile = |p: f64| timings[((timings.len() as f64 * p) as usize).min(timings.len() - 1)];
    let throughput = requests as f64 / total_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Throughput: {:.2} queries/second", throughput);

    Ok(())
}
