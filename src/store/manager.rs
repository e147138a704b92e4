//! Routes one run's readings for a gage to the stores that own them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use super::{ForecastSnapshotStore, MonthKey, MonthlyObservationStore, SaveOutcome};
use crate::{
    config::{file_name, CollectorConfig},
    reading::{Forecast, Observation},
};

/// Result of [`CollectionManager::save_all`].
#[derive(Debug, Default)]
pub struct SaveSummary {
    pub observations_written: usize,
    pub months_written: usize,
    pub forecast: Option<SaveOutcome>,
    /// Stores that failed to save, with the error.
    pub failures: Vec<String>,
}

pub struct CollectionManager {
    config: CollectorConfig,
    gage: String,
    months: BTreeMap<MonthKey, MonthlyObservationStore>,
    years: BTreeSet<i32>,
    forecast: Option<ForecastSnapshotStore>,
}

impl CollectionManager {
    pub fn new(config: &CollectorConfig, gage: &str) -> Self {
        CollectionManager {
            config: config.clone(),
            gage: gage.to_string(),
            months: BTreeMap::new(),
            years: BTreeSet::new(),
            forecast: None,
        }
    }

    /// Sends the observation to its month's store, opening that store on first use.
    pub fn route_observation(&mut self, observation: Observation) -> bool {
        let key = MonthKey::of(&observation.timestamp);
        self.years.insert(key.year);

        let store = self
            .months
            .entry(key)
            .or_insert_with(|| MonthlyObservationStore::open(&self.config, &self.gage, key));

        store.add(observation)
    }

    /// Starts the run's forecast snapshot, replacing any earlier one.
    pub fn begin_forecast_snapshot(&mut self, issued: NaiveDateTime) {
        if let Some(previous) = &self.forecast {
            warn!(
                "forecast snapshot {} replaced by {}",
                previous.issued(),
                issued
            );
        }
        self.forecast = Some(ForecastSnapshotStore::new(&self.config, &self.gage, issued));
    }

    /// Adds the forecast to the current snapshot. Without one it is dropped.
    pub fn route_forecast(&mut self, forecast: Forecast) -> bool {
        match self.forecast.as_mut() {
            Some(snapshot) => {
                snapshot.add(forecast);
                true
            }
            None => {
                debug!("no forecast issuance for {}, dropping forecast", self.gage);
                false
            }
        }
    }

    pub fn years_seen(&self) -> &BTreeSet<i32> {
        &self.years
    }

    #[cfg(test)]
    pub fn month_store(&self, key: &MonthKey) -> Option<&MonthlyObservationStore> {
        self.months.get(key)
    }

    #[cfg(test)]
    pub fn forecast_snapshot(&self) -> Option<&ForecastSnapshotStore> {
        self.forecast.as_ref()
    }

    /// Saves every month store, then the forecast snapshot.
    ///
    /// A store that fails is logged and recorded; the rest are still saved.
    pub fn save_all(&mut self) -> SaveSummary {
        let mut summary = SaveSummary::default();

        for store in self.months.values_mut() {
            match store.save() {
                Ok(0) => {}
                Ok(written) => {
                    debug!("{} new observations in {}", written, file_name(store.path()));
                    summary.observations_written += written;
                    summary.months_written += 1;
                }
                Err(e) => {
                    warn!("could not save {}: {:#}", store.path().display(), e);
                    summary
                        .failures
                        .push(format!("{}: {:#}", store.path().display(), e));
                }
            }
        }

        if let Some(snapshot) = &self.forecast {
            match snapshot.save() {
                Ok(outcome) => summary.forecast = Some(outcome),
                Err(e) => {
                    warn!("could not save {}: {:#}", snapshot.path().display(), e);
                    summary
                        .failures
                        .push(format!("{}: {:#}", snapshot.path().display(), e));
                }
            }
        }

        summary
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;

    fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn should_open_one_store_per_month() {
        let temp_dir = TempDir::new().unwrap();
        let config = CollectorConfig::with_root(temp_dir.path());
        let mut manager = CollectionManager::new(&config, "PEOI2");

        manager.route_observation(Observation::new(at(2023, 12, 31, 22), "5.0", "110"));
        manager.route_observation(Observation::new(at(2023, 12, 31, 23), "5.1", "115"));
        manager.route_observation(Observation::new(at(2024, 1, 1, 0), "5.2", "120"));

        let december = MonthKey {
            year: 2023,
            month: 12,
        };
        let january = MonthKey {
            year: 2024,
            month: 1,
        };
        assert_eq!(manager.month_store(&december).unwrap().pending().len(), 2);
        assert_eq!(manager.month_store(&january).unwrap().pending().len(), 1);
        assert_eq!(
            manager.years_seen().iter().copied().collect::<Vec<_>>(),
            vec![2023, 2024]
        );
    }

    #[test]
    fn should_save_months_and_forecast() {
        let temp_dir = TempDir::new().unwrap();
        let config = CollectorConfig::with_root(temp_dir.path());
        let mut manager = CollectionManager::new(&config, "PEOI2");

        manager.route_observation(Observation::new(at(2023, 12, 31, 23), "5.1", "115"));
        manager.route_observation(Observation::new(at(2024, 1, 1, 0), "5.2", "120"));
        manager.begin_forecast_snapshot(at(2024, 1, 1, 6));
        assert!(manager.route_forecast(Forecast::new(at(2024, 1, 2, 0), "5.9", "140")));

        let summary = manager.save_all();

        assert_eq!(summary.observations_written, 2);
        assert_eq!(summary.months_written, 2);
        assert!(summary.failures.is_empty());
        assert!(summary.forecast.unwrap().is_written());
        let gage_dir = temp_dir.path().join("PEOI2");
        assert!(gage_dir.join("2023").join("observed.202312").exists());
        assert!(gage_dir.join("2024").join("observed.202401").exists());
        assert!(gage_dir.join("2024").join("forecast.202401010600").exists());
    }

    #[test]
    fn should_keep_saving_after_a_failing_month() {
        let temp_dir = TempDir::new().unwrap();
        let config = CollectorConfig::with_root(temp_dir.path());
        let gage_dir = temp_dir.path().join("PEOI2");
        fs::create_dir_all(gage_dir.join("2023").join("observed.202312")).unwrap();

        let mut manager = CollectionManager::new(&config, "PEOI2");
        manager.route_observation(Observation::new(at(2023, 12, 31, 23), "5.1", "115"));
        manager.route_observation(Observation::new(at(2024, 1, 1, 0), "5.2", "120"));
        let summary = manager.save_all();

        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].contains("observed.202312"));
        assert_eq!(summary.observations_written, 1);
        assert_eq!(summary.months_written, 1);
        assert_eq!(
            fs::read_to_string(gage_dir.join("2024").join("observed.202401")).unwrap(),
            "date\tstage\tflow\tPEOI2\n2024-01-01 00:00:00\t5.2\t120"
        );
    }

    #[test]
    fn should_record_failing_forecast_and_keep_months() {
        let temp_dir = TempDir::new().unwrap();
        let config = CollectorConfig::with_root(temp_dir.path());
        let gage_dir = temp_dir.path().join("PEOI2");
        fs::create_dir_all(&gage_dir).unwrap();
        fs::write(gage_dir.join("2024"), "not a directory").unwrap();

        let mut manager = CollectionManager::new(&config, "PEOI2");
        manager.route_observation(Observation::new(at(2023, 12, 31, 23), "5.1", "115"));
        manager.begin_forecast_snapshot(at(2024, 1, 1, 6));
        manager.route_forecast(Forecast::new(at(2024, 1, 2, 0), "5.9", "140"));
        let summary = manager.save_all();

        assert!(summary.forecast.is_none());
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].contains("forecast.202401010600"));
        assert_eq!(summary.observations_written, 1);
        assert!(gage_dir.join("2023").join("observed.202312").exists());
    }

    #[test]
    fn should_drop_forecasts_without_issuance() {
        let temp_dir = TempDir::new().unwrap();
        let config = CollectorConfig::with_root(temp_dir.path());
        let mut manager = CollectionManager::new(&config, "PEOI2");

        for hour in 0..3 {
            assert!(!manager.route_forecast(Forecast::new(at(2024, 1, 2, hour), "5.9", "140")));
        }
        let summary = manager.save_all();

        assert!(summary.forecast.is_none());
        assert!(summary.failures.is_empty());
        assert!(!temp_dir.path().join("PEOI2").exists());
    }

    #[test]
    fn should_replace_snapshot_on_second_begin() {
        let temp_dir = TempDir::new().unwrap();
        let config = CollectorConfig::with_root(temp_dir.path());
        let mut manager = CollectionManager::new(&config, "PEOI2");

        manager.begin_forecast_snapshot(at(2024, 1, 1, 6));
        manager.begin_forecast_snapshot(at(2024, 1, 1, 12));

        assert_eq!(
            manager.forecast_snapshot().unwrap().issued(),
            at(2024, 1, 1, 12)
        );
    }

    #[test]
    fn should_append_nothing_on_second_run() {
        let temp_dir = TempDir::new().unwrap();
        let config = CollectorConfig::with_root(temp_dir.path());
        let observations = vec![
            Observation::new(at(2024, 1, 1, 2), "5.4", "126"),
            Observation::new(at(2024, 1, 1, 0), "5.2", "120"),
            Observation::new(at(2024, 1, 1, 1), "5.3", "122"),
        ];
        let file = temp_dir
            .path()
            .join("PEOI2")
            .join("2024")
            .join("observed.202401");

        let mut first = CollectionManager::new(&config, "PEOI2");
        for observation in observations.clone() {
            first.route_observation(observation);
        }
        first.save_all();
        let after_first = fs::read(&file).unwrap();

        let mut second = CollectionManager::new(&config, "PEOI2");
        for observation in observations {
            assert!(!second.route_observation(observation));
        }
        let summary = second.save_all();

        assert_eq!(summary.observations_written, 0);
        assert_eq!(fs::read(&file).unwrap(), after_first);
    }
}
