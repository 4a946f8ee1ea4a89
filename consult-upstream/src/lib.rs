//! Clients for the external services behind a consultation: the FHIR
//! server and its SMART authorization endpoints, geocoding, air quality,
//! weather, and the generative model.

pub mod air_quality;
pub mod error;
pub mod fhir;
pub mod gemini;
pub mod geocode;
pub mod http;
pub mod smart;
pub mod weather;

pub use air_quality::{AirQualityClient, AirQualityWindow};
pub use error::{Result, UpstreamError};
pub use fhir::{ClinicalResourceType, FhirClient};
pub use gemini::RecommendationClient;
pub use geocode::Geocoder;
pub use http::build_client;
pub use smart::{ClientCredentials, SmartAuthClient, SmartEndpoints, TokenResponse};
pub use weather::{WeatherClient, WeatherWindow};
