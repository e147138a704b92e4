//! Rating curves, saved at most once per gage and year.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use super::{write_snapshot, SaveOutcome};
use crate::{
    config::{header_line, CollectorConfig},
    reading::{Rating, Reading},
};

#[derive(Debug)]
pub struct RatingSnapshotStore {
    year: i32,
    path: PathBuf,
    header: String,
    ratings: Vec<Rating>,
}

impl RatingSnapshotStore {
    pub fn new(config: &CollectorConfig, gage: &str, year: i32) -> Self {
        let path = config
            .year_dir(gage, year)
            .join(format!("{}.{}", config.rating_ident, year));

        RatingSnapshotStore {
            year,
            path,
            header: header_line(&config.rating_header, gage),
            ratings: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this year's rating file is already on disk. Check before
    /// populating the store.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn add(&mut self, rating: Rating) {
        self.ratings.push(rating);
    }

    pub fn extend<I: IntoIterator<Item = Rating>>(&mut self, ratings: I) {
        for rating in ratings {
            self.add(rating);
        }
    }

    /// Writes the ratings in insertion order unless there are none or the
    /// year's file already exists.
    pub fn save(&self) -> Result<SaveOutcome> {
        if self.ratings.is_empty() {
            return Ok(SaveOutcome::Empty);
        }

        let lines = self.ratings.iter().map(|rating| rating.to_line(""));
        let outcome = write_snapshot(&self.path, &self.header, lines)?;

        if let SaveOutcome::AlreadyExists(path) = &outcome {
            info!("rating for {} already exists {}", self.year, path.display());
        }

        Ok(outcome)
    }
}

// -- Tests -------------------------------------------------------------------
