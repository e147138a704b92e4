//! Extracts typed readings from an NWS AHPS hydrograph XML document.
//!
//! ```xml
//! <site id="PEOI2">
//!   <observed>
//!     <datum>
//!       <valid timezone="UTC">2024-01-01T06:00:00-00:00</valid>
//!       <primary name="Stage" units="ft">13.51</primary>
//!       <secondary name="Flow" units="kcfs">28.4</secondary>
//!     </datum>
//!   </observed>
//!   <forecast issued="2024-01-01T14:05:00-00:00"> ... </forecast>
//!   <rating><datum stage="10.0" stageUnits="ft" flow="22.4" flowUnits="kcfs"/></rating>
//! </site>
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime};
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use thiserror::Error;
use tracing::warn;

use crate::reading::{Forecast, Observation, Rating};

/// Wall-clock part of source timestamps; the trailing UTC offset is dropped.
const SOURCE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("malformed XML at byte {position}: {source}")]
    Xml {
        position: usize,
        source: quick_xml::Error,
    },
    #[error("{section} datum has no <{field}>")]
    MissingField {
        section: &'static str,
        field: &'static str,
    },
    #[error("unreadable timestamp `{0}`")]
    Timestamp(String),
}

/// Observed and forecast readings of one document.
#[derive(Debug, Default)]
pub struct GageDocument {
    pub observations: Vec<Observation>,
    /// Issuance of the first forecast; `None` when absent or unreadable.
    pub issued: Option<NaiveDateTime>,
    pub forecasts: Vec<Forecast>,
    /// `timezone` attributes seen on `<valid>` elements.
    pub timezones: BTreeSet<String>,
}

impl GageDocument {
    pub fn non_utc_timezones(&self) -> Vec<&str> {
        self.timezones
            .iter()
            .map(String::as_str)
            .filter(|zone| !zone.eq_ignore_ascii_case("UTC"))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Outside,
    Observed,
    Forecast,
}

impl Section {
    fn name(self) -> &'static str {
        match self {
            Section::Outside => "",
            Section::Observed => "observed",
            Section::Forecast => "forecast",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Valid,
    Primary,
    Secondary,
}

#[derive(Debug, Default)]
struct DatumFields {
    valid: Option<String>,
    primary: Option<String>,
    secondary: Option<String>,
    has_children: bool,
}

impl DatumFields {
    fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Valid => &mut self.valid,
            Field::Primary => &mut self.primary,
            Field::Secondary => &mut self.secondary,
        };
        *slot = Some(value);
    }

    fn into_parts(
        self,
        section: Section,
    ) -> Result<(NaiveDateTime, String, String), ParseError> {
        let missing = |field| ParseError::MissingField {
            section: section.name(),
            field,
        };

        let valid = self.valid.ok_or_else(|| missing("valid"))?;
        let primary = self.primary.ok_or_else(|| missing("primary"))?;
        let secondary = self.secondary.ok_or_else(|| missing("secondary"))?;

        Ok((parse_source_timestamp(&valid)?, primary, secondary))
    }
}

/// Reads every observed and forecast datum, failing on the first bad one.
pub fn parse_readings(data: &[u8]) -> Result<GageDocument, ParseError> {
    let text = std::str::from_utf8(data)?;
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut document = GageDocument::default();
    let mut section = Section::Outside;
    let mut seen_forecast = false;
    let mut datum: Option<DatumFields> = None;
    let mut field: Option<Field> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|source| xml_error(&reader, source))?;

        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"observed" => section = Section::Observed,
                b"forecast" => {
                    section = Section::Forecast;
                    if !seen_forecast {
                        seen_forecast = true;
                        document.issued = issuance(&reader, &e)?;
                    }
                }
                b"datum" if section != Section::Outside => datum = Some(DatumFields::default()),
                name => {
                    if let (Some(fields), Some(child)) = (datum.as_mut(), child_field(name)) {
                        fields.has_children = true;
                        field = Some(child);
                        if let Field::Valid = child {
                            if let Some(zone) = e
                                .try_get_attribute("timezone")
                                .map_err(|source| xml_error(&reader, source))?
                            {
                                let zone = zone
                                    .unescape_value()
                                    .map_err(|source| xml_error(&reader, source))?;
                                document.timezones.insert(zone.to_string());
                            }
                        }
                    }
                }
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"forecast" if !seen_forecast => {
                    seen_forecast = true;
                    document.issued = issuance(&reader, &e)?;
                }
                b"datum" if section == Section::Observed => {
                    return Err(ParseError::MissingField {
                        section: section.name(),
                        field: "valid",
                    })
                }
                name => {
                    if let (Some(fields), Some(child)) = (datum.as_mut(), child_field(name)) {
                        fields.has_children = true;
                        fields.set(child, String::new());
                    }
                }
            },
            Event::Text(t) => {
                if let (Some(fields), Some(current)) = (datum.as_mut(), field) {
                    let value = t.unescape().map_err(|source| xml_error(&reader, source))?;
                    fields.set(current, value.to_string());
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"observed" | b"forecast" => section = Section::Outside,
                b"datum" => {
                    if let Some(fields) = datum.take() {
                        push_datum(&mut document, section, fields)?;
                    }
                }
                name if child_field(name).is_some() => field = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(document)
}

/// Reads the rating curve rows in document order.
pub fn parse_ratings(data: &[u8]) -> Result<Vec<Rating>, ParseError> {
    let text = std::str::from_utf8(data)?;
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut ratings = Vec::new();
    let mut in_rating = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|source| xml_error(&reader, source))?;

        match event {
            Event::Start(e) if e.name().as_ref() == b"rating" => in_rating = true,
            Event::End(e) if e.name().as_ref() == b"rating" => in_rating = false,
            Event::Start(e) | Event::Empty(e) if in_rating && e.name().as_ref() == b"datum" => {
                let attribute = |name: &str| -> Result<String, ParseError> {
                    match e
                        .try_get_attribute(name)
                        .map_err(|source| xml_error(&reader, source))?
                    {
                        Some(attr) => Ok(attr
                            .unescape_value()
                            .map_err(|source| xml_error(&reader, source))?
                            .to_string()),
                        None => Ok(String::new()),
                    }
                };

                ratings.push(Rating {
                    stage: attribute("stage")?,
                    stage_units: attribute("stageUnits")?,
                    flow: attribute("flow")?,
                    flow_units: attribute("flowUnits")?,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(ratings)
}

/// Parses a source timestamp such as `2024-01-01T06:00:00-00:00`, keeping
/// the wall-clock time as published.
pub fn parse_source_timestamp(text: &str) -> Result<NaiveDateTime, ParseError> {
    let text = text.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Ok(timestamp.naive_local());
    }

    let wall_clock = text.get(..19).unwrap_or(text);
    NaiveDateTime::parse_from_str(wall_clock, SOURCE_DATETIME_FORMAT)
        .map_err(|_| ParseError::Timestamp(text.to_string()))
}

fn issuance(reader: &Reader<&[u8]>, e: &BytesStart) -> Result<Option<NaiveDateTime>, ParseError> {
    let Some(attr) = e
        .try_get_attribute("issued")
        .map_err(|source| xml_error(reader, source))?
    else {
        return Ok(None);
    };
    let value = attr
        .unescape_value()
        .map_err(|source| xml_error(reader, source))?;

    match parse_source_timestamp(&value) {
        Ok(issued) => Ok(Some(issued)),
        Err(err) => {
            warn!("ignoring forecast with {}", err);
            Ok(None)
        }
    }
}

fn child_field(name: &[u8]) -> Option<Field> {
    match name {
        b"valid" => Some(Field::Valid),
        b"primary" => Some(Field::Primary),
        b"secondary" => Some(Field::Secondary),
        _ => None,
    }
}

fn push_datum(
    document: &mut GageDocument,
    section: Section,
    fields: DatumFields,
) -> Result<(), ParseError> {
    match section {
        Section::Observed => {
            let (timestamp, stage, flow) = fields.into_parts(section)?;
            document.observations.push(Observation {
                timestamp,
                stage,
                flow,
            });
        }
        // Forecasts sometimes carry empty placeholder datums.
        Section::Forecast if !fields.has_children => {}
        Section::Forecast => {
            let (timestamp, stage, flow) = fields.into_parts(section)?;
            document.forecasts.push(Forecast {
                timestamp,
                stage,
                flow,
            });
        }
        Section::Outside => {}
    }

    Ok(())
}

fn xml_error(reader: &Reader<&[u8]>, source: quick_xml::Error) -> ParseError {
    ParseError::Xml {
        position: reader.buffer_position(),
        source,
    }
}

// -- Tests -------------------------------------------------------------------
