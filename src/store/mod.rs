//! On-disk stores for a gage's observations, forecasts and ratings.
//!
//! Layout under the collection root:
//!
//! ```text
//! <root>/<gage>/<year>/observed.<year><month>   appended to
//! <root>/<gage>/<year>/forecast.<YYYYMMDDHHmm>  write-once
//! <root>/<gage>/<year>/rating.<year>            write-once
//! ```
//!
//! Each file is owned by exactly one store per run. Concurrent collectors for
//! the same gage are not supported: there is no file locking, and the
//! watermark read in [`monthly`] followed by an append is not atomic.

pub mod forecast;
pub mod manager;
pub mod monthly;
pub mod rating;

use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Result;

pub use forecast::ForecastSnapshotStore;
pub use manager::CollectionManager;
pub use monthly::{MonthKey, MonthlyObservationStore};
pub use rating::RatingSnapshotStore;

/// What a write-once snapshot store did when asked to save.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Nothing was buffered.
    Empty,
    /// A snapshot file was already present and was left untouched.
    AlreadyExists(PathBuf),
    Written { path: PathBuf, lines: usize },
}

impl SaveOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, SaveOutcome::Written { .. })
    }
}

/// Writes a header and data lines into a file that must not exist yet.
///
/// Lines are separated by a leading newline, so the file does not end with
/// one. If writing fails part way the file is removed again.
fn write_snapshot<I>(path: &Path, header: &str, lines: I) -> Result<SaveOutcome>
where
    I: IntoIterator<Item = String>,
{
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Ok(SaveOutcome::AlreadyExists(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut writer = BufWriter::new(file);
    let written = write_lines(&mut writer, header, lines).and_then(|count| {
        writer.flush()?;
        Ok(count)
    });

    match written {
        Ok(lines) => Ok(SaveOutcome::Written {
            path: path.to_path_buf(),
            lines,
        }),
        Err(e) => {
            drop(writer);
            let _ = fs::remove_file(path);
            Err(e.into())
        }
    }
}

fn write_lines<W, I>(writer: &mut W, header: &str, lines: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = String>,
{
    writer.write_all(header.as_bytes())?;

    let mut count = 0;
    for line in lines {
        write!(writer, "\n{}", line)?;
        count += 1;
    }

    Ok(count)
}

// -- Tests -------------------------------------------------------------------
