//! Compound queries answered by index narrowing plus in-memory refinement.
//!
//! Each query starts from the narrowest index it can bound, batch-fetches
//! those candidates, runs a [`RefinementPipeline`] over them, and sorts last.

use crate::error::{QueryError, Result};
use crate::executor::{QueryExecutor, Snapshot, sort_movies_descending};
use crate::refinement_pipeline::RefinementPipeline;
use crate::refinements::{GenreMatchFilter, MinimumFilter, ReleasedSinceFilter, RevenueMultipleFilter};
use indexer::{CategoricalAttribute, Movie, NumericField, RecordKey};
use record_store::RecordStore;
use tracing::{info, instrument};

impl<S: RecordStore> QueryExecutor<S> {
    /// Movies with budget at least `min_budget` whose revenue exceeds
    /// `budget * revenue_multiplier`.
    ///
    /// # Arguments
    /// * `min_budget` - Lower bound on budget, inclusive
    /// * `revenue_multiplier` - Revenue must be strictly above this multiple of budget
    ///
    /// # Returns
    /// Matching movies by ROI (revenue / budget) descending
    ///
    /// ## Algorithm
    /// 1. Candidates from the budget index, `budget >= min_budget`
    /// 2. Batch-fetch them and keep those passing the revenue multiple
    /// 3. Sort by ROI, ties by record key
    #[instrument(skip(self))]
    pub fn profitable(&self, min_budget: f64, revenue_multiplier: f64) -> Result<Vec<Movie>> {
        let pipeline = RefinementPipeline::new()
            .add_refinement(RevenueMultipleFilter::new(revenue_multiplier));
        let mut movies = self.refine_range(NumericField::Budget, min_budget, &pipeline)?;
        sort_movies_descending(&mut movies, |m| m.roi().unwrap_or(0.0));
        Ok(movies)
    }

    /// Popular recent releases with enough votes.
    ///
    /// # Arguments
    /// * `year_from` - Earliest release year, inclusive
    /// * `min_popularity` - Lower bound on popularity, inclusive
    /// * `min_vote_count` - Lower bound on vote count, inclusive
    ///
    /// # Returns
    /// Rated matches by popularity descending. A missing release year
    /// counts as year 0.
    #[instrument(skip(self))]
    pub fn popular_recent(
        &self,
        year_from: i32,
        min_popularity: f64,
        min_vote_count: f64,
    ) -> Result<Vec<Movie>> {
        let pipeline = RefinementPipeline::new()
            .add_refinement(ReleasedSinceFilter::new(year_from))
            .add_refinement(MinimumFilter::at_least(NumericField::VoteCount, min_vote_count))
            .add_refinement(MinimumFilter::above(NumericField::Rating, 0.0));
        let mut movies = self.refine_range(NumericField::Popularity, min_popularity, &pipeline)?;
        sort_movies_descending(&mut movies, |m| m.numbers.popularity);
        Ok(movies)
    }

    /// Long, well-rated releases.
    ///
    /// # Arguments
    /// * `min_runtime` - Lower bound on runtime in minutes, inclusive
    /// * `min_rating` - Lower bound on rating, inclusive
    /// * `year_from` - Earliest release year, inclusive
    ///
    /// # Returns
    /// Matches by rating descending, then runtime descending
    #[instrument(skip(self))]
    pub fn long_high_rated(
        &self,
        min_runtime: f64,
        min_rating: f64,
        year_from: i32,
    ) -> Result<Vec<Movie>> {
        let pipeline = RefinementPipeline::new()
            .add_refinement(MinimumFilter::at_least(NumericField::Rating, min_rating))
            .add_refinement(ReleasedSinceFilter::new(year_from));
        let mut movies = self.refine_range(NumericField::Runtime, min_runtime, &pipeline)?;
        movies.sort_by(|a, b| {
            b.numbers
                .rating
                .total_cmp(&a.numbers.rating)
                .then_with(|| b.numbers.runtime.total_cmp(&a.numbers.runtime))
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(movies)
    }

    /// Big-budget, big-revenue movies in one original language.
    ///
    /// Starts from the `language:<language>` bucket, the narrowest index this
    /// query can bound, and refines budget and revenue after fetching.
    ///
    /// # Returns
    /// Matches with a known budget and revenue, by revenue descending
    #[instrument(skip(self))]
    pub fn language_blockbusters(
        &self,
        language: &str,
        min_budget: f64,
        min_revenue: f64,
    ) -> Result<Vec<Movie>> {
        let snapshot = self.snapshot()?;
        let candidates = self.lookup_in(snapshot, CategoricalAttribute::Language, language)?;

        let pipeline = RefinementPipeline::new()
            .add_refinement(MinimumFilter::above(NumericField::Budget, 0.0))
            .add_refinement(MinimumFilter::above(NumericField::Revenue, 0.0))
            .add_refinement(MinimumFilter::at_least(NumericField::Budget, min_budget))
            .add_refinement(MinimumFilter::at_least(NumericField::Revenue, min_revenue));
        let mut movies = self.refine(&candidates, &pipeline)?;
        sort_movies_descending(&mut movies, |m| m.numbers.revenue);
        Ok(movies)
    }

    /// Well-rated movies carrying at least `min_matches` of `genres`.
    ///
    /// # Arguments
    /// * `genres` - Genres to match against; must not be empty
    /// * `min_rating` - Lower bound on rating, inclusive
    /// * `min_matches` - How many of `genres` a movie must carry; must be positive
    ///
    /// # Returns
    /// Matches by rating descending, or [`QueryError::InvalidArgument`] for
    /// an empty genre list or a zero match count
    #[instrument(skip(self))]
    pub fn multi_genre(
        &self,
        genres: &[String],
        min_rating: f64,
        min_matches: usize,
    ) -> Result<Vec<Movie>> {
        if genres.is_empty() || min_matches == 0 {
            return Err(QueryError::InvalidArgument(
                "multi-genre query needs genres and a positive match count".to_string(),
            ));
        }
        let pipeline = RefinementPipeline::new()
            .add_refinement(GenreMatchFilter::new(genres.iter().cloned(), min_matches));
        let mut movies = self.refine_range(NumericField::Rating, min_rating, &pipeline)?;
        sort_movies_descending(&mut movies, |m| m.numbers.rating);
        Ok(movies)
    }

    /// Rated releases since `year_from` matching a genre, a production
    /// country and a language.
    ///
    /// ## Algorithm
    /// 1. Intersect the three buckets in the store
    /// 2. Batch-fetch the intersection
    /// 3. Keep rated movies released in or after `year_from`
    /// 4. Sort by rating descending
    #[instrument(skip(self))]
    pub fn genre_country_language(
        &self,
        genre: &str,
        country: &str,
        language: &str,
        year_from: i32,
    ) -> Result<Vec<Movie>> {
        let snapshot = self.snapshot()?;
        let candidates = self.intersect_in(
            snapshot,
            &[
                (CategoricalAttribute::Genre, genre),
                (CategoricalAttribute::Country, country),
                (CategoricalAttribute::Language, language),
            ],
        )?;

        let pipeline = RefinementPipeline::new()
            .add_refinement(ReleasedSinceFilter::new(year_from))
            .add_refinement(MinimumFilter::above(NumericField::Rating, 0.0));
        let mut movies = self.refine(&candidates, &pipeline)?;
        sort_movies_descending(&mut movies, |m| m.numbers.rating);
        Ok(movies)
    }

    /// Movies with budget at least `min_budget` whose revenue exceeds their
    /// budget.
    ///
    /// # Returns
    /// Matches by absolute profit (revenue - budget) descending
    #[instrument(skip(self))]
    pub fn high_budget_profit(&self, min_budget: f64) -> Result<Vec<Movie>> {
        let pipeline = RefinementPipeline::new().add_refinement(RevenueMultipleFilter::profitable());
        let mut movies = self.refine_range(NumericField::Budget, min_budget, &pipeline)?;
        sort_movies_descending(&mut movies, Movie::profit);
        Ok(movies)
    }

    /// Candidates from `field >= min`, fetched and refined.
    fn refine_range(
        &self,
        field: NumericField,
        min: f64,
        pipeline: &RefinementPipeline,
    ) -> Result<Vec<Movie>> {
        let snapshot: Snapshot = self.snapshot()?;
        let candidates: Vec<RecordKey> = self
            .range_in(snapshot, field, min, f64::INFINITY)?
            .into_iter()
            .map(|entry| entry.member)
            .collect();
        self.refine(&candidates, pipeline)
    }

    fn refine(&self, candidates: &[RecordKey], pipeline: &RefinementPipeline) -> Result<Vec<Movie>> {
        let fetched = self.fetcher.fetch(candidates)?;
        let fetched_count = fetched.len();
        let movies = pipeline.apply(fetched);
        info!(
            "{} candidates, {} fetched, {} after refinement",
            candidates.len(),
            fetched_count,
            movies.len()
        );
        Ok(movies)
    }
}
