pub mod rating;
pub mod timed;

pub use rating::Rating;
pub use timed::{Forecast, Observation};

// Define a trait for serialising a reading into a data file line
pub trait Reading {
    fn to_line(&self, datetime_format: &str) -> String;
}
