//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use indicatif::ProgressBar;

use crate::config::{CollectorConfig, DEFAULT_ROOT, DEFAULT_URL_TEMPLATE};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Collects observed, forecast and rating data for an NWS gage
pub struct Cli {
    /// NWS gage identifier, e.g. PEOI2
    pub gage: String,

    /// Directory the gage files are stored under
    #[arg(long, env = "NWS_COLLECTION_ROOT", default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Source URL, `{gage}` is replaced with the gage identifier
    #[arg(long, env = "NWS_COLLECTION_URL", default_value = DEFAULT_URL_TEMPLATE)]
    pub url: String,
}

impl Cli {
    pub fn config(&self) -> CollectorConfig {
        CollectorConfig {
            root: self.root.clone(),
            url_template: self.url.clone(),
            ..Default::default()
        }
    }
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

// -- Tests -------------------------------------------------------------------
