//! Air-quality and weather series, and their outer join.

use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::timestamp::Timestamp;

/// Hourly AQI values keyed by instant. At most one value per instant; a later
/// insert for the same instant replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AqiSeries {
    values: BTreeMap<Timestamp, i64>,
}

impl AqiSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, timestamp: Timestamp, aqi: i64) {
        self.values.insert(timestamp, aqi);
    }

    pub fn get(&self, timestamp: &Timestamp) -> Option<i64> {
        self.values.get(timestamp).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries in ascending time order
    pub fn iter(&self) -> impl Iterator<Item = (&Timestamp, &i64)> {
        self.values.iter()
    }
}

impl FromIterator<(Timestamp, i64)> for AqiSeries {
    fn from_iter<I: IntoIterator<Item = (Timestamp, i64)>>(iter: I) -> Self {
        let mut series = Self::new();
        for (ts, aqi) in iter {
            series.insert(ts, aqi);
        }
        series
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherSource {
    Current,
    Hourly,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRow {
    pub timestamp: Timestamp,
    pub temperature_f: Option<f64>,
    pub apparent_temperature_f: Option<f64>,
    pub source: WeatherSource,
}

/// Current reading plus hourly rows, sorted by time. Rows sharing an instant
/// are all kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherTable {
    rows: Vec<WeatherRow>,
}

impl WeatherTable {
    pub fn new(current: WeatherRow, hourly: Vec<WeatherRow>) -> Self {
        let mut rows = Vec::with_capacity(hourly.len() + 1);
        rows.push(current);
        rows.extend(hourly);
        // stable: the current reading stays ahead of an hourly row at the same instant
        rows.sort_by_key(|r| r.timestamp);
        Self { rows }
    }

    pub fn rows(&self) -> &[WeatherRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentalSample {
    pub timestamp: Timestamp,
    pub aqi: Option<i64>,
    pub temperature_f: Option<f64>,
    pub apparent_temperature_f: Option<f64>,
}

/// Merged air-quality and weather samples, ascending by timestamp, one row per instant
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnvironmentalTable {
    samples: Vec<EnvironmentalSample>,
}

impl EnvironmentalTable {
    pub fn samples(&self) -> &[EnvironmentalSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `(timestamp, aqi)` for rows with an AQI reading
    pub fn aqi_points(&self) -> Vec<(Timestamp, f64)> {
        self.samples
            .iter()
            .filter_map(|s| s.aqi.map(|v| (s.timestamp, v as f64)))
            .collect()
    }

    pub fn temperature_points(&self) -> Vec<(Timestamp, f64)> {
        self.samples
            .iter()
            .filter_map(|s| s.temperature_f.map(|v| (s.timestamp, v)))
            .collect()
    }

    pub fn apparent_temperature_points(&self) -> Vec<(Timestamp, f64)> {
        self.samples
            .iter()
            .filter_map(|s| s.apparent_temperature_f.map(|v| (s.timestamp, v)))
            .collect()
    }
}

/// Outer join on timestamp. Instants covered by only one input keep `None`
/// in the other input's columns; nothing is interpolated. When the weather
/// table repeats an instant, the current reading is kept.
pub fn merge(aqi: &AqiSeries, weather: &WeatherTable) -> EnvironmentalTable {
    let mut rows: BTreeMap<Timestamp, EnvironmentalSample> = aqi
        .iter()
        .map(|(ts, value)| {
            (
                *ts,
                EnvironmentalSample {
                    timestamp: *ts,
                    aqi: Some(*value),
                    temperature_f: None,
                    apparent_temperature_f: None,
                },
            )
        })
        .collect();

    let mut seen_weather: BTreeMap<Timestamp, WeatherSource> = BTreeMap::new();
    for row in weather.rows() {
        match seen_weather.entry(row.timestamp) {
            Entry::Occupied(mut prior) => {
                if *prior.get() == WeatherSource::Current || row.source != WeatherSource::Current {
                    continue;
                }
                prior.insert(row.source);
            }
            Entry::Vacant(slot) => {
                slot.insert(row.source);
            }
        }
        let sample = rows
            .entry(row.timestamp)
            .or_insert_with(|| EnvironmentalSample {
                timestamp: row.timestamp,
                aqi: None,
                temperature_f: None,
                apparent_temperature_f: None,
            });
        sample.temperature_f = row.temperature_f;
        sample.apparent_temperature_f = row.apparent_temperature_f;
    }

    EnvironmentalTable {
        samples: rows.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn hourly(s: &str, temp: f64, feels: f64) -> WeatherRow {
        WeatherRow {
            timestamp: ts(s),
            temperature_f: Some(temp),
            apparent_temperature_f: Some(feels),
            source: WeatherSource::Hourly,
        }
    }

    fn current(s: &str, temp: f64, feels: f64) -> WeatherRow {
        WeatherRow {
            source: WeatherSource::Current,
            ..hourly(s, temp, feels)
        }
    }

    #[test]
    fn test_single_matching_row() {
        let aqi: AqiSeries = [(ts("2024-01-01T00:00:00Z"), 40)].into_iter().collect();
        let weather = WeatherTable::new(current("2024-01-01T00:00", 60.0, 58.0), vec![]);

        let merged = merge(&aqi, &weather);
        assert_eq!(
            merged.samples(),
            &[EnvironmentalSample {
                timestamp: ts("2024-01-01T00:00:00Z"),
                aqi: Some(40),
                temperature_f: Some(60.0),
                apparent_temperature_f: Some(58.0),
            }]
        );
    }

    #[test]
    fn test_outer_join_keeps_union_of_keys() {
        let aqi: AqiSeries = [
            (ts("2024-01-01T00:00:00Z"), 10),
            (ts("2024-01-01T01:00:00Z"), 20),
        ]
        .into_iter()
        .collect();
        let weather = WeatherTable::new(
            current("2024-01-01T03:00", 50.0, 49.0),
            vec![
                hourly("2024-01-01T01:00", 51.0, 50.0),
                hourly("2024-01-01T02:00", 52.0, 51.0),
            ],
        );

        let merged = merge(&aqi, &weather);
        assert_eq!(merged.len(), 4);

        let s = merged.samples();
        assert_eq!(s[0].aqi, Some(10));
        assert_eq!(s[0].temperature_f, None);
        assert_eq!(s[1].aqi, Some(20));
        assert_eq!(s[1].temperature_f, Some(51.0));
        assert_eq!(s[2].aqi, None);
        assert_eq!(s[2].apparent_temperature_f, Some(51.0));
        assert_eq!(s[3].aqi, None);
        assert_eq!(s[3].temperature_f, Some(50.0));
        assert!(s.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_weather_table_keeps_duplicates_sorted() {
        let table = WeatherTable::new(
            current("2024-01-01T01:00", 70.0, 71.0),
            vec![
                hourly("2024-01-01T02:00", 60.0, 60.0),
                hourly("2024-01-01T00:00", 60.0, 60.0),
                hourly("2024-01-01T01:00", 65.0, 66.0),
            ],
        );
        assert_eq!(table.len(), 4);
        assert!(table
            .rows()
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_current_reading_wins_duplicate_instant() {
        let table = WeatherTable::new(
            current("2024-01-01T01:00", 70.0, 71.0),
            vec![hourly("2024-01-01T01:00", 65.0, 66.0)],
        );
        let merged = merge(&AqiSeries::new(), &table);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.samples()[0].temperature_f, Some(70.0));
    }

    #[test]
    fn test_aqi_insert_overwrites() {
        let mut series = AqiSeries::new();
        series.insert(ts("2024-01-01T00:00:00Z"), 10);
        series.insert(ts("2024-01-01T00:00:00Z"), 99);
        assert_eq!(series.len(), 1);
        assert_eq!(series.get(&ts("2024-01-01T00:00:00Z")), Some(99));
    }
}
