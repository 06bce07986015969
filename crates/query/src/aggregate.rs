//! Group-by aggregations over index buckets.
//!
//! Grouped aggregations enumerate one categorical namespace of the pinned
//! generation, fetch each bucket's members, and reduce them. Non-positive
//! values are skipped from mean/min/max but still count toward a bucket's raw
//! membership. Genre combinations scan primary records instead, since a
//! combination has no bucket of its own.
//!
//! A bucket aggregation makes one store call per bucket, so it checks that
//! its pinned generation survived all of them before returning.

use crate::error::{QueryError, Result};
use crate::executor::{QueryExecutor, Snapshot};
use indexer::{CategoricalAttribute, Movie};
use rayon::prelude::*;
use record_store::RecordStore;
use serde::Serialize;
use std::collections::HashMap;

/// Record count and rating summary per sorted genre set.
type ComboGroups = HashMap<Vec<String>, (usize, Summary)>;
use tracing::{debug, info, instrument};

/// Count, sum, min and max over positive values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    /// Adds `value` if it is positive.
    pub fn add(&mut self, value: f64) {
        if value <= 0.0 {
            return;
        }
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    /// Combine with a summary of disjoint values.
    pub fn merge(&mut self, other: &Summary) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

impl FromIterator<f64> for Summary {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut summary = Summary::default();
        for value in iter {
            summary.add(value);
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearCount {
    pub year: i32,
    pub movie_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreRating {
    pub genre: String,
    /// Records with a positive rating
    pub rated_count: usize,
    pub avg_rating: f64,
    pub min_rating: f64,
    pub max_rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorCount {
    pub actor: String,
    pub movie_count: usize,
    pub avg_rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyTrend {
    pub year: i32,
    pub movie_count: usize,
    pub avg_rating: Option<f64>,
    pub avg_budget: Option<f64>,
    pub avg_revenue: Option<f64>,
    pub avg_runtime: Option<f64>,
    /// Records rated at or above the requested threshold
    pub high_rated_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreCombination {
    /// Sorted genre names
    pub genres: Vec<String>,
    pub movie_count: usize,
    pub avg_rating: Option<f64>,
}

impl<S: RecordStore> QueryExecutor<S> {
    /// Movies per release year, from bucket cardinalities alone, newest first.
    #[instrument(skip(self))]
    pub fn movies_per_year(&self) -> Result<Vec<YearCount>> {
        let snapshot = self.snapshot()?;
        let buckets = self.buckets(snapshot, CategoricalAttribute::Year)?;

        let mut counts = buckets
            .par_iter()
            .filter_map(|(value, key)| {
                let year = value.parse::<i32>().ok()?;
                Some(
                    self.store
                        .set_cardinality(key)
                        .map(|movie_count| YearCount { year, movie_count })
                        .map_err(QueryError::from),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        self.ensure_live(snapshot)?;

        counts.sort_by(|a, b| b.year.cmp(&a.year));
        Ok(counts)
    }

    /// Rating statistics per genre, highest average first. Genres without
    /// any positive rating are left out.
    #[instrument(skip(self))]
    pub fn rating_by_genre(&self) -> Result<Vec<GenreRating>> {
        let snapshot = self.snapshot()?;
        let buckets = self.buckets(snapshot, CategoricalAttribute::Genre)?;

        let mut rows: Vec<GenreRating> = buckets
            .par_iter()
            .map(|(genre, key)| -> Result<Option<GenreRating>> {
                let movies = self.bucket_movies(key)?;
                let ratings: Summary = movies.iter().map(|m| m.numbers.rating).collect();
                Ok(ratings.mean().map(|avg_rating| GenreRating {
                    genre: genre.clone(),
                    rated_count: ratings.count,
                    avg_rating,
                    min_rating: ratings.min,
                    max_rating: ratings.max,
                }))
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        self.ensure_live(snapshot)?;

        rows.sort_by(|a, b| {
            b.avg_rating
                .total_cmp(&a.avg_rating)
                .then_with(|| a.genre.cmp(&b.genre))
        });
        Ok(rows)
    }

    /// The `top_n` actors by number of movies, among actors with at least
    /// `min_movies` of them. Ties on count go to the higher average rating.
    #[instrument(skip(self))]
    pub fn top_actors(&self, top_n: usize, min_movies: usize) -> Result<Vec<ActorCount>> {
        let snapshot = self.snapshot()?;
        let buckets = self.buckets(snapshot, CategoricalAttribute::Actor)?;

        let mut rows: Vec<ActorCount> = buckets
            .par_iter()
            .map(|(actor, key)| -> Result<Option<ActorCount>> {
                let movie_count = self.store.set_cardinality(key)?;
                if movie_count < min_movies {
                    return Ok(None);
                }
                let movies = self.bucket_movies(key)?;
                let ratings: Summary = movies.iter().map(|m| m.numbers.rating).collect();
                Ok(ratings.mean().map(|avg_rating| ActorCount {
                    actor: actor.clone(),
                    movie_count,
                    avg_rating,
                }))
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        self.ensure_live(snapshot)?;

        rows.sort_by(|a, b| {
            b.movie_count
                .cmp(&a.movie_count)
                .then_with(|| b.avg_rating.total_cmp(&a.avg_rating))
                .then_with(|| a.actor.cmp(&b.actor))
        });
        rows.truncate(top_n);
        Ok(rows)
    }

    /// Per-year averages for years from `year_from` on, newest first.
    #[instrument(skip(self))]
    pub fn yearly_trends(&self, year_from: i32, high_rating: f64) -> Result<Vec<YearlyTrend>> {
        let snapshot = self.snapshot()?;
        let buckets: Vec<(i32, String)> = self
            .buckets(snapshot, CategoricalAttribute::Year)?
            .into_iter()
            .filter_map(|(value, key)| value.parse::<i32>().ok().map(|year| (year, key)))
            .filter(|(year, _)| *year >= year_from)
            .collect();

        let mut rows = buckets
            .par_iter()
            .map(|(year, key)| -> Result<YearlyTrend> {
                let members: Vec<String> = self.store.members_of_set(key)?.into_iter().collect();
                let movies = self.fetcher.fetch(&members)?;
                Ok(trend_for(*year, members.len(), &movies, high_rating))
            })
            .collect::<Result<Vec<_>>>()?;
        self.ensure_live(snapshot)?;

        rows.sort_by(|a, b| b.year.cmp(&a.year));
        Ok(rows)
    }

    /// Frequency of exact genre sets among movies with two or more genres,
    /// keeping sets seen at least `min_support` times, most frequent first.
    #[instrument(skip(self))]
    pub fn genre_combinations(&self, min_support: usize) -> Result<Vec<GenreCombination>> {
        let prefix = &self.config.record_prefix;
        let mut groups = ComboGroups::new();
        let mut scanned = 0usize;
        let mut token: Option<String> = None;

        loop {
            let page = self
                .store
                .scan_keys_by_prefix(prefix, token.as_deref(), self.config.scan_page_size)?;
            scanned += page.keys.len();

            let page_groups = self
                .fetcher
                .fetch(&page.keys)?
                .into_par_iter()
                .filter(|movie| movie.genres.len() >= 2)
                .fold(ComboGroups::new, |mut acc, movie| {
                    let mut genres = movie.genres;
                    genres.sort();
                    let (count, ratings) = acc.entry(genres).or_default();
                    *count += 1;
                    ratings.add(movie.numbers.rating);
                    acc
                })
                .reduce(ComboGroups::new, merge_groups);
            groups = merge_groups(groups, page_groups);

            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        let mut rows: Vec<GenreCombination> = groups
            .into_iter()
            .filter(|(_, (count, _))| *count >= min_support)
            .map(|(genres, (movie_count, ratings))| GenreCombination {
                genres,
                movie_count,
                avg_rating: ratings.mean(),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.movie_count
                .cmp(&a.movie_count)
                .then_with(|| a.genres.cmp(&b.genres))
        });

        info!("Scanned {} records into {} genre combinations", scanned, rows.len());
        Ok(rows)
    }

    /// Every `(value, index key)` bucket of `attr` in the pinned generation.
    fn buckets(&self, snapshot: Snapshot, attr: CategoricalAttribute) -> Result<Vec<(String, String)>> {
        let prefix = snapshot.generation().categorical_prefix(attr);
        let mut buckets = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .store
                .scan_keys_by_prefix(&prefix, token.as_deref(), self.config.scan_page_size)?;
            buckets.extend(
                page.keys
                    .into_iter()
                    .map(|key| (key[prefix.len()..].to_string(), key)),
            );
            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!("{} {} buckets", buckets.len(), attr);
        Ok(buckets)
    }

    fn bucket_movies(&self, key: &str) -> Result<Vec<Movie>> {
        let members: Vec<String> = self.store.members_of_set(key)?.into_iter().collect();
        self.fetcher.fetch(&members)
    }
}

fn merge_groups(mut into: ComboGroups, from: ComboGroups) -> ComboGroups {
    for (genres, (count, ratings)) in from {
        let (total, summary) = into.entry(genres).or_default();
        *total += count;
        summary.merge(&ratings);
    }
    into
}

fn trend_for(year: i32, movie_count: usize, movies: &[Movie], high_rating: f64) -> YearlyTrend {
    let mut rating = Summary::default();
    let mut budget = Summary::default();
    let mut revenue = Summary::default();
    let mut runtime = Summary::default();
    let mut high_rated_count = 0;

    for movie in movies {
        let n = &movie.numbers;
        rating.add(n.rating);
        budget.add(n.budget);
        revenue.add(n.revenue);
        runtime.add(n.runtime);
        if n.rating >= high_rating {
            high_rated_count += 1;
        }
    }

    YearlyTrend {
        year,
        movie_count,
        avg_rating: rating.mean(),
        avg_budget: budget.mean(),
        avg_revenue: revenue.mean(),
        avg_runtime: runtime.mean(),
        high_rated_count,
    }
}
