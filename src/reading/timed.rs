//! Timestamped stage/flow readings.

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;

use super::Reading;

/// An observed stage and flow at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: NaiveDateTime,
    pub stage: String,
    pub flow: String,
}

/// A forecast stage and flow. Belongs to exactly one issuance snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub timestamp: NaiveDateTime,
    pub stage: String,
    pub flow: String,
}

impl Observation {
    pub fn new(timestamp: NaiveDateTime, stage: &str, flow: &str) -> Self {
        Observation {
            timestamp,
            stage: stage.to_string(),
            flow: flow.to_string(),
        }
    }
}

impl Forecast {
    pub fn new(timestamp: NaiveDateTime, stage: &str, flow: &str) -> Self {
        Forecast {
            timestamp,
            stage: stage.to_string(),
            flow: flow.to_string(),
        }
    }
}

impl Reading for Observation {
    fn to_line(&self, datetime_format: &str) -> String {
        timed_line(&self.timestamp, &self.stage, &self.flow, datetime_format)
    }
}

impl Reading for Forecast {
    fn to_line(&self, datetime_format: &str) -> String {
        timed_line(&self.timestamp, &self.stage, &self.flow, datetime_format)
    }
}

fn timed_line(timestamp: &NaiveDateTime, stage: &str, flow: &str, datetime_format: &str) -> String {
    format!("{}\t{}\t{}", timestamp.format(datetime_format), stage, flow)
}

/// Parses the timestamp in the first tab-delimited field of a data line.
pub fn timestamp_from_line(line: &str, datetime_format: &str) -> Result<NaiveDateTime> {
    let field = line
        .split('\t')
        .next()
        .filter(|field| !field.is_empty())
        .ok_or_else(|| anyhow!("line has no timestamp field"))?;

    Ok(NaiveDateTime::parse_from_str(field.trim(), datetime_format)?)
}

// -- Tests -------------------------------------------------------------------
