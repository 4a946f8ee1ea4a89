//! Air-quality lookups: forecast, current conditions and history.

use consult_core::{AqiSeries, Coordinates, Timestamp};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::error::{Result, UpstreamError};
use crate::http::{send_json, trim_base};

const SERVICE: &str = "air-quality";

/// Hours of history and forecast to request
#[derive(Debug, Clone, Copy)]
pub struct AirQualityWindow {
    pub history_hours: u32,
    pub forecast_hours: i64,
}

impl Default for AirQualityWindow {
    fn default() -> Self {
        Self {
            history_hours: 720,
            forecast_hours: 96,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupPage {
    #[serde(default)]
    hourly_forecasts: Vec<HourlyIndex>,
    #[serde(default)]
    hours_info: Vec<HourlyIndex>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HourlyIndex {
    date_time: Option<String>,
    indexes: Option<Vec<AqiIndex>>,
}

#[derive(Debug, Deserialize)]
struct AqiIndex {
    aqi: Option<i64>,
}

impl HourlyIndex {
    fn reading(&self) -> Option<(&str, i64)> {
        let date_time = self.date_time.as_deref()?;
        let aqi = self.indexes.as_ref()?.first()?.aqi?;
        Some((date_time, aqi))
    }
}

#[derive(Clone, Copy)]
enum Lookup {
    Forecast,
    CurrentConditions,
    History,
}

impl Lookup {
    fn endpoint(&self) -> &'static str {
        match self {
            Lookup::Forecast => "forecast",
            Lookup::CurrentConditions => "currentConditions",
            Lookup::History => "history",
        }
    }
}

pub struct AirQualityClient {
    http: Client,
    base_url: String,
    api_key: String,
    universal_aqi: bool,
}

impl AirQualityClient {
    pub fn new(
        http: Client,
        base_url: &str,
        api_key: impl Into<String>,
        universal_aqi: bool,
    ) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
            api_key: api_key.into(),
            universal_aqi,
        }
    }

    /// Forecast, current reading and history merged into one series.
    ///
    /// Lookups run in that order and a later value replaces an earlier one
    /// for the same instant.
    pub async fn fetch(
        &self,
        location: Coordinates,
        now: Timestamp,
        window: AirQualityWindow,
    ) -> Result<AqiSeries> {
        let mut series = AqiSeries::new();

        let forecast = self
            .paged_lookup(
                Lookup::Forecast,
                json!({
                    "location": location_body(location),
                    "period": {
                        "startTime": now.plus_hours(1).to_string(),
                        "endTime": now.plus_hours(window.forecast_hours).to_string(),
                    },
                    "universalAqi": self.universal_aqi,
                }),
            )
            .await?;
        for entry in &forecast {
            let (date_time, aqi) = entry.reading().ok_or_else(|| {
                UpstreamError::malformed(SERVICE, "forecast hour without dateTime or AQI")
            })?;
            series.insert(parse_time(date_time)?, aqi);
        }

        let current = self.current_conditions(location).await?;
        series.insert(current.0, current.1);

        let history = self
            .paged_lookup(
                Lookup::History,
                json!({
                    "hours": window.history_hours,
                    "pageSize": window.history_hours,
                    "location": location_body(location),
                    "universalAqi": self.universal_aqi,
                }),
            )
            .await?;
        // History hours without data are reported without indexes
        for (date_time, aqi) in history.iter().filter_map(HourlyIndex::reading) {
            series.insert(parse_time(date_time)?, aqi);
        }

        tracing::debug!(
            forecast_hours = forecast.len(),
            history_hours = history.len(),
            total = series.len(),
            "Retrieved air quality series"
        );
        Ok(series)
    }

    async fn current_conditions(&self, location: Coordinates) -> Result<(Timestamp, i64)> {
        let body = json!({
            "location": location_body(location),
            "universalAqi": self.universal_aqi,
        });
        let current: HourlyIndex = self.lookup(Lookup::CurrentConditions, &body).await?;
        let (date_time, aqi) = current.reading().ok_or_else(|| {
            UpstreamError::malformed(SERVICE, "current conditions without dateTime or AQI")
        })?;
        Ok((parse_time(date_time)?, aqi))
    }

    async fn lookup<T: serde::de::DeserializeOwned>(
        &self,
        lookup: Lookup,
        body: &Value,
    ) -> Result<T> {
        let url = format!("{}/v1/{}:lookup", self.base_url, lookup.endpoint());
        let request = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body);
        send_json(SERVICE, request).await
    }

    /// Repeat the lookup with each `nextPageToken` until none is returned
    async fn paged_lookup(&self, lookup: Lookup, mut body: Value) -> Result<Vec<HourlyIndex>> {
        let mut entries = Vec::new();
        let mut seen_tokens = HashSet::new();

        loop {
            let page: LookupPage = self.lookup(lookup, &body).await?;
            entries.extend(page.hourly_forecasts);
            entries.extend(page.hours_info);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(UpstreamError::malformed(
                            SERVICE,
                            format!("{} repeated page token {}", lookup.endpoint(), token),
                        ));
                    }
                    body["pageToken"] = Value::String(token);
                }
                None => break,
            }
        }
        Ok(entries)
    }
}

fn location_body(location: Coordinates) -> Value {
    json!({
        "latitude": location.latitude,
        "longitude": location.longitude,
    })
}

fn parse_time(raw: &str) -> Result<Timestamp> {
    Timestamp::parse(raw).map_err(|e| UpstreamError::malformed(SERVICE, e.to_string()))
}
