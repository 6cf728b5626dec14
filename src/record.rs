use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// One validated earthquake row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarthquakeRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
}

/// Why a row was skipped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedRecord {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is not a number: {value:?}")]
    NotNumeric { field: &'static str, value: String },
    #[error("field `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("unreadable row: {0}")]
    Unreadable(String),
}

impl EarthquakeRecord {
    /// Validates ranges: latitude in [-90, 90], longitude in [-180, 180],
    /// depth >= 0, every value finite.
    pub fn new(
        latitude: f64,
        longitude: f64,
        depth_km: f64,
        magnitude: f64,
    ) -> Result<Self, MalformedRecord> {
        check_range(LATITUDE, latitude, -90.0, 90.0)?;
        check_range(LONGITUDE, longitude, -180.0, 180.0)?;
        check_range(DEPTH, depth_km, 0.0, f64::INFINITY)?;
        if !magnitude.is_finite() {
            return Err(MalformedRecord::OutOfRange {
                field: MAGNITUDE,
                value: magnitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
            depth_km,
            magnitude,
        })
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), MalformedRecord> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(MalformedRecord::OutOfRange { field, value })
    }
}

const LATITUDE: &str = "latitude";
const LONGITUDE: &str = "longitude";
const DEPTH: &str = "depth";
const MAGNITUDE: &str = "magnitude";

// Accepted header names per field, compared case-insensitively
const LATITUDE_ALIASES: &[&str] = &["latitude", "lat"];
const LONGITUDE_ALIASES: &[&str] = &["longitude", "lon", "lng", "long"];
const DEPTH_ALIASES: &[&str] = &["depth", "depth_km"];
const MAGNITUDE_ALIASES: &[&str] = &["mag", "magnitude"];

/// Column positions resolved from the header row
#[derive(Debug, Clone, Copy, Default)]
struct Columns {
    latitude: Option<usize>,
    longitude: Option<usize>,
    depth: Option<usize>,
    magnitude: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::ByteRecord) -> Self {
        let names: Vec<_> = headers.iter().map(String::from_utf8_lossy).collect();
        let find = |aliases: &[&str]| {
            names
                .iter()
                .position(|h| aliases.iter().any(|a| h.trim().eq_ignore_ascii_case(a)))
        };
        Self {
            latitude: find(LATITUDE_ALIASES),
            longitude: find(LONGITUDE_ALIASES),
            depth: find(DEPTH_ALIASES),
            magnitude: find(MAGNITUDE_ALIASES),
        }
    }

    fn record(&self, row: &csv::ByteRecord) -> Result<EarthquakeRecord, MalformedRecord> {
        let latitude = numeric_field(row, self.latitude, LATITUDE)?;
        let longitude = numeric_field(row, self.longitude, LONGITUDE)?;
        let depth_km = numeric_field(row, self.depth, DEPTH)?;
        let magnitude = numeric_field(row, self.magnitude, MAGNITUDE)?;
        EarthquakeRecord::new(latitude, longitude, depth_km, magnitude)
    }
}

fn numeric_field(
    row: &csv::ByteRecord,
    column: Option<usize>,
    field: &'static str,
) -> Result<f64, MalformedRecord> {
    let bytes = column
        .and_then(|i| row.get(i))
        .filter(|b| !b.is_empty())
        .ok_or(MalformedRecord::MissingField(field))?;

    // Only the fields we read need to be text; other columns may hold any bytes
    let raw = std::str::from_utf8(bytes)
        .map_err(|_| MalformedRecord::NotNumeric {
            field,
            value: String::from_utf8_lossy(bytes).into_owned(),
        })?
        .trim();

    // "NaN" and "inf" parse as f64 but are not usable coordinates
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(MalformedRecord::NotNumeric {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Result of one parse pass over a source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSource {
    /// Accepted records, in source order
    pub records: Vec<EarthquakeRecord>,
    /// Data rows seen (header excluded)
    pub rows: usize,
    /// Rows rejected as malformed
    pub skipped: usize,
}

/// Parses CSV with a header row into validated records.
///
/// Columns are looked up by name, so their order does not matter. Rows that
/// fail coercion or range checks are skipped and counted, never returned
/// as errors. The input need not be valid UTF-8 outside the four fields read.
pub fn parse(raw: impl AsRef<[u8]>) -> ParsedSource {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_ref());

    let columns = match reader.byte_headers() {
        Ok(headers) => Columns::from_headers(headers),
        Err(e) => {
            debug!("Unreadable header row: {}", e);
            return ParsedSource::default();
        }
    };

    let mut parsed = ParsedSource::default();
    for (index, row) in reader.byte_records().enumerate() {
        let line = row
            .as_ref()
            .ok()
            .and_then(|r| r.position())
            .map(|p| p.line())
            .unwrap_or(index as u64 + 2);
        // A fully blank line carries no data
        if matches!(&row, Ok(r) if r.iter().all(|f| f.is_empty())) {
            continue;
        }
        parsed.rows += 1;

        let outcome = row
            .map_err(|e| MalformedRecord::Unreadable(e.to_string()))
            .and_then(|r| columns.record(&r));

        match outcome {
            Ok(record) => parsed.records.push(record),
            Err(reason) => {
                debug!("Skipping line {}: {}", line, reason);
                parsed.skipped += 1;
            }
        }
    }

    parsed
}
