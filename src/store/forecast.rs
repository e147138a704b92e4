//! Write-once forecast snapshots, one file per issuance.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{Datelike, NaiveDateTime};
use tracing::info;

use super::{write_snapshot, SaveOutcome};
use crate::{
    config::{header_line, CollectorConfig},
    reading::{Forecast, Reading},
};

#[derive(Debug)]
pub struct ForecastSnapshotStore {
    issued: NaiveDateTime,
    path: PathBuf,
    header: String,
    datetime_format: String,
    forecasts: Vec<Forecast>,
}

impl ForecastSnapshotStore {
    pub fn new(config: &CollectorConfig, gage: &str, issued: NaiveDateTime) -> Self {
        // Minute precision: re-published issuances collide, distinct ones don't.
        let path = config.year_dir(gage, issued.year()).join(format!(
            "{}.{}",
            config.forecast_ident,
            issued.format("%Y%m%d%H%M")
        ));

        ForecastSnapshotStore {
            issued,
            path,
            header: header_line(&config.forecast_header, gage),
            datetime_format: config.datetime_format.clone(),
            forecasts: Vec::new(),
        }
    }

    pub fn issued(&self) -> NaiveDateTime {
        self.issued
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add(&mut self, forecast: Forecast) {
        self.forecasts.push(forecast);
    }

    /// Writes the snapshot unless it is empty or already on disk.
    pub fn save(&self) -> Result<SaveOutcome> {
        if self.forecasts.is_empty() {
            return Ok(SaveOutcome::Empty);
        }

        let lines = self
            .forecasts
            .iter()
            .map(|forecast| forecast.to_line(&self.datetime_format));
        let outcome = write_snapshot(&self.path, &self.header, lines)?;

        if let SaveOutcome::AlreadyExists(path) = &outcome {
            info!("forecast report already exists {}", path.display());
        }

        Ok(outcome)
    }
}

// -- Tests -------------------------------------------------------------------
