//! One consultation, end to end: clinical record, location, environment,
//! charts and the model's recommendation.

use consult_core::{
    chart, map_embed_url, merge, prompt, ClinicalHistory, Coordinates, EnvironmentalTable,
    Figure, PatientDemographics, Timestamp,
};
use consult_upstream::{
    AirQualityClient, AirQualityWindow, ClinicalResourceType, FhirClient, Geocoder,
    RecommendationClient, SmartAuthClient, WeatherClient, WeatherWindow,
};
use reqwest::Client;
use serde::Serialize;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::error::ConsultError;
use crate::session::SmartContext;

/// Clients shared by every request
pub struct Services {
    http: Client,
    pub smart: SmartAuthClient,
    geocoder: Geocoder,
    air_quality: AirQualityClient,
    air_quality_window: AirQualityWindow,
    weather: WeatherClient,
    recommender: RecommendationClient,
    maps_api_key: String,
}

impl Services {
    pub fn from_config(config: &ServerConfig, http: Client) -> Self {
        let env = &config.environment;
        Self {
            smart: SmartAuthClient::new(http.clone()),
            geocoder: Geocoder::new(
                http.clone(),
                &config.endpoints.geocoding,
                config.google.maps_api_key.clone(),
            ),
            air_quality: AirQualityClient::new(
                http.clone(),
                &config.endpoints.air_quality,
                config.google.maps_api_key.clone(),
                env.universal_aqi,
            ),
            air_quality_window: AirQualityWindow {
                history_hours: env.history_hours,
                forecast_hours: env.forecast_hours,
            },
            weather: WeatherClient::new(
                http.clone(),
                &config.endpoints.weather,
                WeatherWindow {
                    past_days: env.past_days,
                    forecast_days: env.forecast_days,
                },
            ),
            recommender: RecommendationClient::new(
                http.clone(),
                &config.endpoints.gemini,
                config.google.gemini_api_key.clone(),
                config.google.gemini_model.clone(),
            ),
            maps_api_key: config.google.maps_api_key.clone(),
            http,
        }
    }
}

/// Everything shown on the consultation page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    pub patient_id: String,
    pub generated_at: Timestamp,
    pub demographics: PatientDemographics,
    pub history: ClinicalHistory,
    pub coordinates: Coordinates,
    pub map_url: String,
    pub environment: EnvironmentalTable,
    pub aqi_chart: Figure,
    pub temperature_chart: Figure,
    pub model: String,
    pub recommendation: String,
}

pub async fn run_consultation(
    services: &Services,
    context: &SmartContext,
) -> Result<Consultation, ConsultError> {
    let started = Instant::now();
    let fhir = FhirClient::new(
        services.http.clone(),
        &context.api_base,
        context.access_token.clone(),
    )?;
    let patient_id = context.patient_id.as_str();

    let (patient, conditions) = tokio::try_join!(
        fhir.read_patient(patient_id),
        fhir.search_all(ClinicalResourceType::Condition, patient_id),
    )?;
    let encounters = fhir
        .search_all(ClinicalResourceType::Encounter, patient_id)
        .await?;
    let administrations = fhir
        .search_all(ClinicalResourceType::MedicationAdministration, patient_id)
        .await?;
    tracing::info!(
        patient = patient_id,
        conditions = conditions.len(),
        encounters = encounters.len(),
        medication_administrations = administrations.len(),
        "Fetched clinical record"
    );

    let demographics = PatientDemographics::from_patient(&patient)?;
    let history = ClinicalHistory::summarize(&conditions, &encounters, &administrations)?;

    let coordinates = services.geocoder.geocode(&demographics.address).await?;
    let map_url = map_embed_url(&services.maps_api_key, &demographics.address);

    let now = Timestamp::now();
    let (aqi, weather) = tokio::try_join!(
        services
            .air_quality
            .fetch(coordinates, now, services.air_quality_window),
        services.weather.fetch(coordinates),
    )?;
    let environment = merge(&aqi, &weather);
    tracing::info!(
        aqi_points = aqi.len(),
        weather_rows = weather.len(),
        merged = environment.len(),
        "Merged environmental data"
    );

    let aqi_chart = chart::aqi_chart(&environment, now);
    let temperature_chart = chart::temperature_chart(&environment, now);

    let prompt = prompt::build_prompt(&demographics, &history, now, &environment);
    let recommendation = services.recommender.recommend(&prompt).await?;

    tracing::info!(
        patient = patient_id,
        model = services.recommender.model(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Consultation ready"
    );

    Ok(Consultation {
        patient_id: context.patient_id.clone(),
        generated_at: now,
        demographics,
        history,
        coordinates,
        map_url,
        environment,
        aqi_chart,
        temperature_chart,
        model: services.recommender.model().to_string(),
        recommendation,
    })
}
