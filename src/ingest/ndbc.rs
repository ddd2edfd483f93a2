/// NDBC realtime2 bulletin parsing.
///
/// Parses the two whitespace-delimited text products NDBC publishes for
/// each buoy:
///
///   https://www.ndbc.noaa.gov/data/realtime2/{station}.txt   (standard meteorological)
///   https://www.ndbc.noaa.gov/data/realtime2/{station}.spec  (spectral wave summary)
///
/// Both files open with two `#` lines (column names, then units) followed by
/// rows listed newest first. Columns are located by header name rather than
/// position, since NDBC has reordered them before.
///
/// This is the single place where NDBC's missing-value markers are
/// recognised. `MM`, `N/A` and the legacy 99 / 999 / 9999 sentinels become
/// `None` here; nothing downstream ever sees them.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::error::{Result, SwellError};
use crate::model::{StationObservation, WavePartition};

/// Sentinel for heights, periods and speeds.
const SENTINEL_SMALL: f64 = 99.0;
/// Sentinel for directions.
const SENTINEL_DIRECTION: f64 = 999.0;

/// 16-point compass used by the SwD/WWD columns of `.spec` files.
const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW", "NNW",
];

/// Parsed rows plus what had to be thrown away.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBulletin {
    /// Ascending by timestamp.
    pub observations: Vec<StationObservation>,
    /// Rows skipped for a bad timestamp or the wrong number of columns.
    pub dropped_rows: usize,
}

// ---------------------------------------------------------------------------
// Field parsing
// ---------------------------------------------------------------------------

/// Parses one numeric token. Missing markers, sentinels and garbage all
/// become `None`.
pub fn parse_value(token: &str, sentinel: f64) -> Option<f64> {
    match token {
        "MM" | "N/A" | "" => None,
        _ => token
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v < sentinel),
    }
}

/// Converts a 16-point compass label to degrees true.
pub fn compass_to_degrees(label: &str) -> Option<f64> {
    COMPASS_POINTS
        .iter()
        .position(|p| p.eq_ignore_ascii_case(label))
        .map(|i| i as f64 * 22.5)
}

/// Column name → index, taken from the first `#` line.
struct Header {
    columns: Vec<String>,
}

impl Header {
    fn parse(text: &str) -> Result<Self> {
        let line = text
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with('#'))
            .ok_or_else(|| SwellError::Parse("bulletin has no '#' header line".to_string()))?;
        let columns = line
            .trim_start_matches('#')
            .split_whitespace()
            .map(str::to_string)
            .collect::<Vec<_>>();
        Ok(Self { columns })
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.index(name)
            .ok_or_else(|| SwellError::Parse(format!("bulletin header is missing column '{}'", name)))
    }
}

/// Row accessor that resolves optional columns to `None` when absent.
struct Row<'a> {
    fields: Vec<&'a str>,
}

impl<'a> Row<'a> {
    fn value(&self, column: Option<usize>, sentinel: f64) -> Option<f64> {
        column.and_then(|i| self.fields.get(i)).and_then(|t| parse_value(t, sentinel))
    }

    fn token(&self, column: Option<usize>) -> Option<&'a str> {
        column.and_then(|i| self.fields.get(i)).copied()
    }
}

/// Timestamp columns, shared by both products.
struct TimeColumns {
    year: usize,
    month: usize,
    day: usize,
    hour: usize,
    minute: usize,
}

impl TimeColumns {
    fn from_header(header: &Header) -> Result<Self> {
        let year = header.index("YY").or_else(|| header.index("YYYY")).ok_or_else(|| {
            SwellError::Parse("bulletin header is missing the year column".to_string())
        })?;
        Ok(Self {
            year,
            month: header.require("MM")?,
            day: header.require("DD")?,
            hour: header.require("hh")?,
            minute: header.require("mm")?,
        })
    }

    fn timestamp(&self, fields: &[&str]) -> Option<DateTime<Utc>> {
        let num = |i: usize| fields.get(i).and_then(|t| t.parse::<u32>().ok());
        let mut year = num(self.year)? as i32;
        if year < 100 {
            year += 2000;
        }
        NaiveDate::from_ymd_opt(year, num(self.month)?, num(self.day)?)?
            .and_hms_opt(num(self.hour)?, num(self.minute)?, 0)
            .map(|naive| naive.and_utc())
    }
}

/// Walks data rows, skipping `#` lines, and hands each well-formed row to
/// `build`. Rows with the wrong width or an unreadable timestamp are
/// dropped and counted.
fn parse_rows(
    station_id: &str,
    text: &str,
    header: &Header,
    mut build: impl FnMut(&Row, DateTime<Utc>) -> StationObservation,
) -> Result<ParsedBulletin> {
    let time = TimeColumns::from_header(header)?;
    let mut observations = Vec::new();
    let mut dropped_rows = 0;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != header.columns.len() {
            dropped_rows += 1;
            continue;
        }
        let Some(timestamp) = time.timestamp(&fields) else {
            dropped_rows += 1;
            continue;
        };

        observations.push(build(&Row { fields }, timestamp));
    }

    if dropped_rows > 0 {
        warn!("{}: dropped {} malformed bulletin rows", station_id, dropped_rows);
    }
    observations.sort_by_key(|o| o.timestamp);
    debug!("{}: parsed {} bulletin rows", station_id, observations.len());

    Ok(ParsedBulletin { observations, dropped_rows })
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Parses a standard meteorological (`.txt`) bulletin.
///
/// # Errors
/// `SwellError::Parse` if the header line or a timestamp column is missing.
pub fn parse_standard_met(station_id: &str, text: &str) -> Result<ParsedBulletin> {
    let header = Header::parse(text)?;
    let wdir = header.index("WDIR");
    let wspd = header.index("WSPD");
    let gst = header.index("GST");
    let wvht = header.index("WVHT");
    let dpd = header.index("DPD");
    let apd = header.index("APD");
    let mwd = header.index("MWD");

    parse_rows(station_id, text, &header, |row, timestamp| {
        let mut obs = StationObservation::new(station_id, timestamp);
        obs.wind_direction_deg = row.value(wdir, SENTINEL_DIRECTION);
        obs.wind_speed_mps = row.value(wspd, SENTINEL_SMALL);
        obs.wind_gust_mps = row.value(gst, SENTINEL_SMALL);
        obs.wave_height_m = row.value(wvht, SENTINEL_SMALL);
        obs.dominant_period_s = row.value(dpd, SENTINEL_SMALL);
        obs.average_period_s = row.value(apd, SENTINEL_SMALL);
        obs.mean_direction_deg = row.value(mwd, SENTINEL_DIRECTION);
        obs
    })
}

/// Parses a spectral wave summary (`.spec`) bulletin into swell and
/// wind-wave partitions.
///
/// # Errors
/// `SwellError::Parse` if the header line or a timestamp column is missing.
pub fn parse_spectral_summary(station_id: &str, text: &str) -> Result<ParsedBulletin> {
    let header = Header::parse(text)?;
    let wvht = header.index("WVHT");
    let swh = header.index("SwH");
    let swp = header.index("SwP");
    let wwh = header.index("WWH");
    let wwp = header.index("WWP");
    let swd = header.index("SwD");
    let wwd = header.index("WWD");
    let apd = header.index("APD");
    let mwd = header.index("MWD");

    parse_rows(station_id, text, &header, |row, timestamp| {
        let mut obs = StationObservation::new(station_id, timestamp);
        obs.wave_height_m = row.value(wvht, SENTINEL_SMALL);
        obs.average_period_s = row.value(apd, SENTINEL_SMALL);
        obs.mean_direction_deg = row.value(mwd, SENTINEL_DIRECTION);
        obs.swell = WavePartition::new(
            row.value(swh, SENTINEL_SMALL),
            row.value(swp, SENTINEL_SMALL),
            row.token(swd).and_then(compass_to_degrees),
        );
        obs.wind_wave = WavePartition::new(
            row.value(wwh, SENTINEL_SMALL),
            row.value(wwp, SENTINEL_SMALL),
            row.token(wwd).and_then(compass_to_degrees),
        );
        obs
    })
}

/// Parses a bulletin, choosing the product from the file extension
/// (`spec` for the wave summary, anything else as standard met).
pub fn parse_bulletin(station_id: &str, extension: &str, text: &str) -> Result<ParsedBulletin> {
    if extension.eq_ignore_ascii_case("spec") {
        parse_spectral_summary(station_id, text)
    } else {
        parse_standard_met(station_id, text)
    }
}

/// Joins met and spectral rows on timestamp.
///
/// Met rows supply the bulk and wind fields, spectral rows the partitions.
/// A bulk field missing from the met row is filled from the spectral row
/// for the same hour. Output is ascending by timestamp.
pub fn merge_observations(
    met: Vec<StationObservation>,
    spectral: Vec<StationObservation>,
) -> Vec<StationObservation> {
    let mut by_time: BTreeMap<DateTime<Utc>, StationObservation> = BTreeMap::new();
    for obs in met {
        by_time.insert(obs.timestamp, obs);
    }

    for spec in spectral {
        match by_time.get_mut(&spec.timestamp) {
            Some(obs) => {
                obs.swell = spec.swell;
                obs.wind_wave = spec.wind_wave;
                obs.wave_height_m = obs.wave_height_m.or(spec.wave_height_m);
                obs.average_period_s = obs.average_period_s.or(spec.average_period_s);
                obs.mean_direction_deg = obs.mean_direction_deg.or(spec.mean_direction_deg);
            }
            None => {
                by_time.insert(spec.timestamp, spec);
            }
        }
    }

    by_time.into_values().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::{fixture_46025_spec, fixture_46025_txt, fixture_46086_all_missing_txt};
    use chrono::TimeZone;

    #[test]
    fn test_parse_value_maps_missing_markers_to_none() {
        assert_eq!(parse_value("MM", SENTINEL_SMALL), None);
        assert_eq!(parse_value("N/A", SENTINEL_SMALL), None);
        assert_eq!(parse_value("99.00", SENTINEL_SMALL), None);
        assert_eq!(parse_value("999", SENTINEL_DIRECTION), None);
        assert_eq!(parse_value("abc", SENTINEL_SMALL), None);
        assert_eq!(parse_value("0.0", SENTINEL_SMALL), Some(0.0), "a measured zero stays zero");
        assert_eq!(parse_value("2.4", SENTINEL_SMALL), Some(2.4));
    }

    #[test]
    fn test_compass_points_convert_to_degrees() {
        assert_eq!(compass_to_degrees("N"), Some(0.0));
        assert_eq!(compass_to_degrees("NW"), Some(315.0));
        assert_eq!(compass_to_degrees("WNW"), Some(292.5));
        assert_eq!(compass_to_degrees("ssw"), Some(202.5));
        assert_eq!(compass_to_degrees("MM"), None);
    }

    #[test]
    fn test_parse_standard_met_values_and_order() {
        let parsed = parse_standard_met("46025", fixture_46025_txt()).expect("fixture should parse");
        assert_eq!(parsed.dropped_rows, 0);
        assert_eq!(parsed.observations.len(), 3);

        let times: Vec<_> = parsed.observations.iter().map(|o| o.timestamp).collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]), "output must be ascending");

        let latest = parsed.observations.last().expect("has rows");
        assert_eq!(latest.timestamp, Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap());
        assert_eq!(latest.wave_height_m, Some(2.4));
        assert_eq!(latest.dominant_period_s, Some(14.0));
        assert_eq!(latest.mean_direction_deg, Some(326.0));
        assert_eq!(latest.wind_speed_mps, Some(5.0));
    }

    #[test]
    fn test_parse_standard_met_missing_columns_are_none() {
        let parsed = parse_standard_met("46025", fixture_46025_txt()).expect("fixture should parse");
        let oldest = &parsed.observations[0];
        assert_eq!(oldest.mean_direction_deg, None, "MM direction");
        assert_eq!(oldest.wind_gust_mps, None, "99.0 gust sentinel");
        assert_eq!(oldest.wave_height_m, Some(2.1));
    }

    #[test]
    fn test_all_missing_station_parses_to_empty_observations() {
        let parsed = parse_standard_met("46086", fixture_46086_all_missing_txt()).expect("fixture should parse");
        assert_eq!(parsed.observations.len(), 2);
        assert!(parsed.observations.iter().all(|o| !o.has_wave_data()));
    }

    #[test]
    fn test_parse_spectral_summary_partitions() {
        let parsed = parse_spectral_summary("46025", fixture_46025_spec()).expect("fixture should parse");
        let latest = parsed.observations.last().expect("has rows");
        assert_eq!(latest.swell, WavePartition::new(Some(2.4), Some(14.0), Some(315.0)));
        assert_eq!(latest.wind_wave, WavePartition::new(Some(0.3), Some(5.0), Some(270.0)));
    }

    #[test]
    fn test_short_and_undated_rows_are_dropped_and_counted() {
        let text = "#YY  MM DD hh mm WVHT DPD MWD\n\
                    #yr  mo dy hr mn    m sec degT\n\
                    2024 01 15 12 00  2.4 14.0 326\n\
                    2024 01 15 11 00  2.3\n\
                    2024 13 15 10 00  2.2 14.0 326\n";
        let parsed = parse_standard_met("46025", text).expect("header is valid");
        assert_eq!(parsed.observations.len(), 1);
        assert_eq!(parsed.dropped_rows, 2);
    }

    #[test]
    fn test_missing_header_is_parse_error() {
        let result = parse_standard_met("46025", "2024 01 15 12 00 2.4 14.0 326\n");
        assert!(matches!(result, Err(SwellError::Parse(_))));
    }

    #[test]
    fn test_parse_bulletin_dispatches_on_extension() {
        let spec = parse_bulletin("46025", "spec", fixture_46025_spec()).expect("spec parses");
        assert!(spec.observations.iter().any(|o| !o.swell.is_empty()));
        let met = parse_bulletin("46025", "txt", fixture_46025_txt()).expect("txt parses");
        assert!(met.observations.iter().all(|o| o.swell.is_empty()));
    }

    #[test]
    fn test_merge_joins_rows_on_timestamp() {
        let met = parse_standard_met("46025", fixture_46025_txt()).expect("txt parses").observations;
        let spec = parse_spectral_summary("46025", fixture_46025_spec()).expect("spec parses").observations;
        let merged = merge_observations(met, spec);

        assert_eq!(merged.len(), 3);
        let latest = merged.last().expect("has rows");
        assert_eq!(latest.wind_speed_mps, Some(5.0), "met field kept");
        assert_eq!(latest.swell.period_s, Some(14.0), "spectral partition attached");

        // the 10:00 met row has no MWD; the spectral row fills it
        assert_eq!(merged[0].mean_direction_deg, Some(320.0));
    }
}
