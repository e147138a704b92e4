//! Month-by-month observation files.
//!
//! A month file only ever grows. Its last line carries the watermark: the
//! latest timestamp already on disk. Observations at or before the watermark
//! are dropped, so re-running the collector over an overlapping window never
//! duplicates a line.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{Datelike, NaiveDateTime};
use tracing::{debug, warn};

use crate::{
    config::{header_line, CollectorConfig},
    reading::{timed::timestamp_from_line, Observation, Reading},
};

const TAIL_CHUNK: u64 = 4096;

/// Calendar month an observation file covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(timestamp: &NaiveDateTime) -> Self {
        MonthKey {
            year: timestamp.year(),
            month: timestamp.month(),
        }
    }

    /// File suffix, e.g. `202401`.
    pub fn suffix(&self) -> String {
        format!("{}{:02}", self.year, self.month)
    }
}

#[derive(Debug)]
pub struct MonthlyObservationStore {
    path: PathBuf,
    header: String,
    datetime_format: String,
    watermark: NaiveDateTime,
    pending: Vec<Observation>,
}

impl MonthlyObservationStore {
    /// Creates the store for `key` and reads its watermark from disk.
    pub fn open(config: &CollectorConfig, gage: &str, key: MonthKey) -> Self {
        let path = config
            .year_dir(gage, key.year)
            .join(format!("{}.{}", config.observed_ident, key.suffix()));
        let watermark = determine_watermark(&path, &config.datetime_format);

        MonthlyObservationStore {
            path,
            header: header_line(&config.observation_header, gage),
            datetime_format: config.datetime_format.clone(),
            watermark,
            pending: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Latest timestamp already saved; `NaiveDateTime::MIN` when nothing is.
    pub fn watermark(&self) -> NaiveDateTime {
        self.watermark
    }

    #[cfg(test)]
    pub fn pending(&self) -> &[Observation] {
        &self.pending
    }

    /// Buffers the observation if it is newer than the watermark.
    pub fn add(&mut self, observation: Observation) -> bool {
        if observation.timestamp > self.watermark {
            self.pending.push(observation);
            true
        } else {
            false
        }
    }

    /// Appends buffered observations in time order and returns how many were written.
    pub fn save(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        self.pending.sort_by_key(|observation| observation.timestamp);

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let last_byte = read_last_byte(&self.path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);

        let mut separator = match last_byte {
            None => {
                writer.write_all(self.header.as_bytes())?;
                "\n"
            }
            Some(b'\n') => "",
            Some(_) => "\n",
        };
        for observation in &self.pending {
            write!(
                writer,
                "{}{}",
                separator,
                observation.to_line(&self.datetime_format)
            )?;
            separator = "\n";
        }
        writer.flush()?;

        let written = self.pending.len();
        if let Some(last) = self.pending.last() {
            self.watermark = last.timestamp;
        }
        self.pending.clear();

        Ok(written)
    }
}

/// Timestamp of the last line of an existing month file.
///
/// Missing, empty, header-only or unreadable files give `NaiveDateTime::MIN`.
/// A malformed last line does too, which may re-append saved observations
/// but never loses any.
pub fn determine_watermark(path: &Path, datetime_format: &str) -> NaiveDateTime {
    let last_line = match read_last_line(path) {
        Ok(Some(line)) => line,
        Ok(None) => return NaiveDateTime::MIN,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return NaiveDateTime::MIN,
        Err(e) => {
            warn!("could not read {}: {}", path.display(), e);
            return NaiveDateTime::MIN;
        }
    };

    match timestamp_from_line(&last_line.text, datetime_format) {
        Ok(timestamp) => timestamp,
        Err(_) if last_line.is_first => {
            debug!("{} has no data lines yet", path.display());
            NaiveDateTime::MIN
        }
        Err(e) => {
            warn!(
                "last line of {} has no readable timestamp ({}), re-saving whole month",
                path.display(),
                e
            );
            NaiveDateTime::MIN
        }
    }
}

/// Last byte of a file; `None` when the file is missing or empty.
fn read_last_byte(path: &Path) -> io::Result<Option<u8>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    if file.seek(SeekFrom::End(0))? == 0 {
        return Ok(None);
    }

    let mut byte = [0; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut byte)?;
    Ok(Some(byte[0]))
}

struct LastLine {
    text: String,
    /// No line precedes this one, so it is the header.
    is_first: bool,
}

/// Reads the last non-empty line of a file by scanning backwards from its end.
fn read_last_line(path: &Path) -> io::Result<Option<LastLine>> {
    let mut file = File::open(path)?;
    let mut pos = file.seek(SeekFrom::End(0))?;
    let mut tail: Vec<u8> = Vec::new();

    while pos > 0 {
        let step = TAIL_CHUNK.min(pos);
        pos -= step;

        let mut chunk = vec![0; step as usize];
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&tail);
        tail = chunk;

        let content = trim_line_ends(&tail);
        if let Some(newline) = content.iter().rposition(|&b| b == b'\n') {
            return Ok(Some(LastLine {
                text: decode(&content[newline + 1..]),
                is_first: false,
            }));
        }
    }

    let content = trim_line_ends(&tail);
    if content.is_empty() {
        Ok(None)
    } else {
        Ok(Some(LastLine {
            text: decode(content),
            is_first: true,
        }))
    }
}

fn trim_line_ends(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != b'\n' && b != b'\r')
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end_matches('\r').to_string()
}

// -- Tests -------------------------------------------------------------------
