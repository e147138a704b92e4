//! Collection layout and formats.

use std::path::{Path, PathBuf};

pub const DEFAULT_ROOT: &str = "./nws/";
pub const DEFAULT_URL_TEMPLATE: &str =
    "https://water.weather.gov/ahps2/hydrograph_to_xml.php?gage={gage}&output=xml";

/// Everything the collector needs to know about where files go and how they look.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub root: PathBuf,
    pub url_template: String,
    pub observed_ident: String,
    pub forecast_ident: String,
    pub rating_ident: String,
    pub observation_header: String,
    pub forecast_header: String,
    pub rating_header: String,
    /// Datetime format of the first column of observation and forecast files.
    pub datetime_format: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            root: PathBuf::from(DEFAULT_ROOT),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            observed_ident: "observed".to_string(),
            forecast_ident: "forecast".to_string(),
            rating_ident: "rating".to_string(),
            observation_header: "date\tstage\tflow".to_string(),
            forecast_header: "date\tstage\tflow".to_string(),
            rating_header: "stage\tstage units\tflow\tflow units".to_string(),
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

impl CollectorConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        CollectorConfig {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn gage_dir(&self, gage: &str) -> PathBuf {
        self.root.join(gage)
    }

    pub fn year_dir(&self, gage: &str, year: i32) -> PathBuf {
        self.gage_dir(gage).join(year.to_string())
    }

    pub fn source_url(&self, gage: &str) -> String {
        self.url_template.replace("{gage}", gage)
    }
}

/// Header line of a data file: the column names followed by the gage id.
pub fn header_line(columns: &str, gage: &str) -> String {
    format!("{}\t{}", columns, gage)
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}
