//! Terminal output for query results.

use anyhow::Result;
use colored::Colorize;
use indexer::{Movie, RebuildReport};
use query::{ActorCount, GenreCombination, GenreRating, QueryExecutor, YearCount, YearlyTrend};
use record_store::{MemoryStore, ScoredMember};
use serde::Serialize;
use std::collections::HashMap;

fn print_json<T: Serialize + ?Sized>(rows: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(rows)?);
    Ok(())
}

fn format_id(id: Option<&str>) -> String {
    id.map_or_else(String::new, |id| format!(" #{}", id))
}

fn format_average(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

pub fn print_rebuild(report: &RebuildReport) {
    let generation = report
        .generation
        .map_or_else(|| "none".to_string(), |g| g.to_string());
    println!("{}", format!("Published generation {}", generation).bold().blue());
    println!("{}Processed: {}", "• ".green(), report.processed);
    println!("{}Skipped: {}", "• ".green(), report.skipped);
    for (namespace, keys) in &report.namespace_keys {
        let entries = report.namespace_entries.get(namespace).copied().unwrap_or(0);
        println!("  - {:<12} {:>6} keys {:>8} entries", namespace, keys, entries);
    }
    if !report.collected.is_empty() {
        let collected: Vec<String> = report.collected.iter().map(|g| g.to_string()).collect();
        println!("{}Collected generations: {}", "• ".cyan(), collected.join(", "));
    }
}

pub fn print_movies(label: &str, movies: &[Movie], limit: usize, json: bool) -> Result<()> {
    let shown = &movies[..movies.len().min(limit)];
    if json {
        return print_json(shown);
    }

    println!("{} ({} results)", label.bold().blue(), movies.len());
    for (rank, movie) in shown.iter().enumerate() {
        let n = &movie.numbers;
        println!(
            "{}. {}{} ({}) [{}] rating {:.1} budget {:.0} revenue {:.0} runtime {:.0}",
            (rank + 1).to_string().green(),
            movie.display_title(),
            format_id(movie.id.as_deref()).as_str().dimmed(),
            movie.year.map_or_else(|| "?".to_string(), |y| y.to_string()),
            movie.genres.join(", "),
            n.rating,
            n.budget,
            n.revenue,
            n.runtime
        );
    }
    Ok(())
}

/// Ranked keys with their literal scores, titled from a batch fetch.
pub fn print_ranked(
    executor: &QueryExecutor<MemoryStore>,
    label: &str,
    ranked: &[ScoredMember],
    limit: usize,
    json: bool,
) -> Result<()> {
    let shown = &ranked[..ranked.len().min(limit)];
    let keys: Vec<String> = shown.iter().map(|entry| entry.member.clone()).collect();
    let movies: HashMap<String, Movie> = executor
        .fetch(&keys)?
        .into_iter()
        .map(|movie| (movie.key.clone(), movie))
        .collect();

    if json {
        let rows: Vec<serde_json::Value> = shown
            .iter()
            .map(|entry| {
                let movie = movies.get(&entry.member);
                serde_json::json!({
                    "key": entry.member,
                    "id": movie.and_then(|m| m.id.as_deref()),
                    "title": movie.map(Movie::display_title),
                    "score": entry.score,
                })
            })
            .collect();
        return print_json(&rows);
    }

    println!("{} ({} results)", label.bold().blue(), ranked.len());
    for (rank, entry) in shown.iter().enumerate() {
        let movie = movies.get(&entry.member);
        let title = movie.map_or(entry.member.as_str(), Movie::display_title);
        let id = format_id(movie.and_then(|m| m.id.as_deref()));
        println!(
            "{}. {}{} - {}",
            (rank + 1).to_string().green(),
            title,
            id.as_str().dimmed(),
            entry.score
        );
    }
    Ok(())
}

pub fn print_years(rows: &[YearCount], json: bool) -> Result<()> {
    if json {
        return print_json(rows);
    }
    println!("{}", "Movies per year:".bold().blue());
    for row in rows {
        println!("  {} {}", row.year, row.movie_count);
    }
    Ok(())
}

pub fn print_genre_ratings(rows: &[GenreRating], json: bool) -> Result<()> {
    if json {
        return print_json(rows);
    }
    println!("{}", "Rating by genre:".bold().blue());
    for row in rows {
        println!(
            "  {:<20} avg {:.2} min {:.1} max {:.1} ({} rated)",
            row.genre, row.avg_rating, row.min_rating, row.max_rating, row.rated_count
        );
    }
    Ok(())
}

pub fn print_actors(rows: &[ActorCount], json: bool) -> Result<()> {
    if json {
        return print_json(rows);
    }
    println!("{}", "Top actors:".bold().blue());
    for (rank, row) in rows.iter().enumerate() {
        println!(
            "{}. {} - {} movies, avg rating {:.2}",
            (rank + 1).to_string().green(),
            row.actor,
            row.movie_count,
            row.avg_rating
        );
    }
    Ok(())
}

pub fn print_trends(rows: &[YearlyTrend], json: bool) -> Result<()> {
    if json {
        return print_json(rows);
    }
    println!("{}", "Yearly trends:".bold().blue());
    for row in rows {
        println!(
            "  {} {:>5} movies | rating {} | budget {} | revenue {} | runtime {} | {} high rated",
            row.year,
            row.movie_count,
            format_average(row.avg_rating),
            format_average(row.avg_budget),
            format_average(row.avg_revenue),
            format_average(row.avg_runtime),
            row.high_rated_count
        );
    }
    Ok(())
}

pub fn print_combinations(rows: &[GenreCombination], json: bool) -> Result<()> {
    if json {
        return print_json(rows);
    }
    println!("{}", "Genre combinations:".bold().blue());
    for row in rows {
        println!(
            "  {:<50} {:>5} movies, avg rating {}",
            row.genres.join(" + "),
            row.movie_count,
            format_average(row.avg_rating)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_id() {
        assert_eq!(format_id(Some("603")), " #603");
        assert_eq!(format_id(None), "");
    }
}
