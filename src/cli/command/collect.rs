//! Fetches a gage's document and files its readings.

use std::{fmt, fs};

use anyhow::{bail, Result};
use tracing::{info, warn};

use crate::{
    cli::create_spinner,
    config::CollectorConfig,
    deserialise::{parse_ratings, parse_readings},
    download::fetch_document,
    reading::Rating,
    store::{CollectionManager, RatingSnapshotStore, SaveOutcome},
};

/// What one collection run wrote.
#[derive(Debug, Default)]
pub struct CollectSummary {
    pub gage: String,
    pub observations_written: usize,
    pub months_written: usize,
    pub forecast: Option<SaveOutcome>,
    pub rating_years_written: Vec<i32>,
    pub failures: Vec<String>,
}

impl fmt::Display for CollectSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} new observations in {} month files",
            self.gage, self.observations_written, self.months_written
        )?;
        match &self.forecast {
            Some(SaveOutcome::Written { path, lines }) => {
                write!(f, ", forecast of {} points saved to `{}`", lines, path.display())?
            }
            Some(SaveOutcome::AlreadyExists(_)) => write!(f, ", forecast already saved")?,
            _ => write!(f, ", no forecast")?,
        }
        if !self.rating_years_written.is_empty() {
            let years: Vec<String> = self
                .rating_years_written
                .iter()
                .map(|year| year.to_string())
                .collect();
            write!(f, ", rating saved for {}", years.join(", "))?;
        }
        if !self.failures.is_empty() {
            write!(f, " ({} stores failed)", self.failures.len())?;
        }

        Ok(())
    }
}

pub async fn collect(gage: &str, config: &CollectorConfig) -> Result<CollectSummary> {
    let bar = create_spinner(format!("Downloading {}...", gage));
    let fetched = fetch_document(&config.source_url(gage)).await;
    bar.finish_and_clear();

    let data = fetched?;
    if data.is_empty() {
        bail!("Failed to retrieve data for {}", gage);
    }

    ingest(gage, &data, config)
}

/// Files the readings of an already fetched document.
pub fn ingest(gage: &str, data: &[u8], config: &CollectorConfig) -> Result<CollectSummary> {
    fs::create_dir_all(config.gage_dir(gage))?;

    let mut summary = CollectSummary {
        gage: gage.to_string(),
        ..Default::default()
    };

    let document = match parse_readings(data) {
        Ok(document) => document,
        Err(e) => {
            warn!("could not get observed or forecast for {}: {}", gage, e);
            return Ok(summary);
        }
    };

    let zones = document.non_utc_timezones();
    if !zones.is_empty() {
        warn!(
            "{} reports times in {}; files keep wall-clock times without offsets",
            gage,
            zones.join(", ")
        );
    }

    info!("has observations: {}", !document.observations.is_empty());
    info!("has forecasts: {}", !document.forecasts.is_empty());

    let mut manager = CollectionManager::new(config, gage);
    for observation in document.observations {
        manager.route_observation(observation);
    }
    if let Some(issued) = document.issued {
        manager.begin_forecast_snapshot(issued);
    }
    for forecast in document.forecasts {
        manager.route_forecast(forecast);
    }

    let saved = manager.save_all();
    summary.observations_written = saved.observations_written;
    summary.months_written = saved.months_written;
    summary.forecast = saved.forecast;
    summary.failures = saved.failures;

    let mut ratings: Option<Vec<Rating>> = None;
    for &year in manager.years_seen() {
        let mut store = RatingSnapshotStore::new(config, gage, year);
        if store.exists() {
            continue;
        }

        if ratings.is_none() {
            ratings = match parse_ratings(data) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!("could not get rating for {}: {}", gage, e);
                    break;
                }
            };
        }
        store.extend(ratings.iter().flatten().cloned());

        match store.save() {
            Ok(outcome) if outcome.is_written() => summary.rating_years_written.push(year),
            Ok(_) => {}
            Err(e) => {
                warn!("could not save {}: {:#}", store.path().display(), e);
                summary
                    .failures
                    .push(format!("{}: {:#}", store.path().display(), e));
            }
        }
    }

    Ok(summary)
}

// -- Tests -------------------------------------------------------------------
