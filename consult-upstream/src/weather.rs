//! Hourly temperature history and forecast from Open-Meteo.

use consult_core::{Coordinates, Timestamp, WeatherRow, WeatherSource, WeatherTable};
use reqwest::Client;
use serde::Deserialize;

use crate::error::{Result, UpstreamError};
use crate::http::{send_json, trim_base};

const SERVICE: &str = "weather";
const VARIABLES: &str = "temperature_2m,apparent_temperature";

#[derive(Debug, Clone, Copy)]
pub struct WeatherWindow {
    pub past_days: u32,
    pub forecast_days: u32,
}

impl Default for WeatherWindow {
    fn default() -> Self {
        Self {
            past_days: 29,
            forecast_days: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentBlock,
    hourly: HourlyBlock,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: String,
    temperature_2m: Option<f64>,
    apparent_temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    apparent_temperature: Vec<Option<f64>>,
}

pub struct WeatherClient {
    http: Client,
    base_url: String,
    window: WeatherWindow,
}

impl WeatherClient {
    pub fn new(http: Client, base_url: &str, window: WeatherWindow) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
            window,
        }
    }

    /// Current reading and hourly series in Fahrenheit, sorted by time
    pub async fn fetch(&self, location: Coordinates) -> Result<WeatherTable> {
        let request = self
            .http
            .get(format!("{}/v1/forecast", self.base_url))
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("current", VARIABLES.to_string()),
                ("hourly", VARIABLES.to_string()),
                ("temperature_unit", "fahrenheit".to_string()),
                ("timezone", "GMT".to_string()),
                ("past_days", self.window.past_days.to_string()),
                ("forecast_days", self.window.forecast_days.to_string()),
            ]);
        let response: ForecastResponse = send_json(SERVICE, request).await?;
        let table = into_table(response)?;

        tracing::debug!(rows = table.len(), "Retrieved weather series");
        Ok(table)
    }
}

fn into_table(response: ForecastResponse) -> Result<WeatherTable> {
    let ForecastResponse { current, hourly } = response;

    if hourly.temperature_2m.len() != hourly.time.len()
        || hourly.apparent_temperature.len() != hourly.time.len()
    {
        return Err(UpstreamError::malformed(
            SERVICE,
            format!(
                "hourly arrays differ in length (time {}, temperature {}, apparent {})",
                hourly.time.len(),
                hourly.temperature_2m.len(),
                hourly.apparent_temperature.len()
            ),
        ));
    }

    let current_row = WeatherRow {
        timestamp: parse_time(&current.time)?,
        temperature_f: current.temperature_2m,
        apparent_temperature_f: current.apparent_temperature,
        source: WeatherSource::Current,
    };

    let hourly_rows = hourly
        .time
        .iter()
        .zip(hourly.temperature_2m)
        .zip(hourly.apparent_temperature)
        .map(|((time, temperature_f), apparent_temperature_f)| {
            Ok(WeatherRow {
                timestamp: parse_time(time)?,
                temperature_f,
                apparent_temperature_f,
                source: WeatherSource::Hourly,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(WeatherTable::new(current_row, hourly_rows))
}

fn parse_time(raw: &str) -> Result<Timestamp> {
    Timestamp::parse(raw).map_err(|e| UpstreamError::malformed(SERVICE, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_are_current_plus_hourly() {
        let response: ForecastResponse = serde_json::from_value(json!({
            "current": {"time": "2024-01-01T01:15", "temperature_2m": 40.0, "apparent_temperature": 35.5},
            "hourly": {
                "time": ["2024-01-01T02:00", "2024-01-01T00:00", "2024-01-01T01:00"],
                "temperature_2m": [41.0, 39.0, null],
                "apparent_temperature": [36.0, 34.0, 35.0]
            }
        }))
        .unwrap();

        let table = into_table(response).unwrap();
        assert_eq!(table.len(), 4);
        let times: Vec<String> = table.rows().iter().map(|r| r.timestamp.to_string()).collect();
        assert_eq!(
            times,
            vec![
                "2024-01-01T00:00:00Z",
                "2024-01-01T01:00:00Z",
                "2024-01-01T01:15:00Z",
                "2024-01-01T02:00:00Z"
            ]
        );
        assert_eq!(table.rows()[1].temperature_f, None);
        assert_eq!(table.rows()[2].source, WeatherSource::Current);
    }

    #[test]
    fn test_mismatched_arrays_are_malformed() {
        let response: ForecastResponse = serde_json::from_value(json!({
            "current": {"time": "2024-01-01T01:00", "temperature_2m": 40.0, "apparent_temperature": 35.5},
            "hourly": {
                "time": ["2024-01-01T00:00"],
                "temperature_2m": [],
                "apparent_temperature": [34.0]
            }
        }))
        .unwrap();
        assert!(matches!(
            into_table(response),
            Err(UpstreamError::Malformed { .. })
        ));
    }
}
