//! Authorization request of the SMART EHR launch.

use reqwest::Url;

use crate::config::SmartSettings;
use crate::error::ConsultError;

/// Authorization URL the browser is sent to from `/launch`
pub fn authorize_url(
    authorization_endpoint: &str,
    settings: &SmartSettings,
    state: &str,
    launch: Option<&str>,
) -> Result<Url, ConsultError> {
    let mut params = vec![
        ("response_type", "code"),
        ("client_id", settings.client_id.as_str()),
        ("redirect_uri", settings.redirect_uri.as_str()),
        ("scope", settings.scope.as_str()),
        ("state", state),
        ("aud", settings.api_base.as_str()),
    ];
    if let Some(launch) = launch {
        params.push(("launch", launch));
    }
    Url::parse_with_params(authorization_endpoint, &params).map_err(|e| {
        ConsultError::Internal(format!(
            "Invalid authorization endpoint {}: {}",
            authorization_endpoint, e
        ))
    })
}

/// Whether the `iss` of a launch names the configured FHIR server
pub fn issuer_matches(iss: &str, api_base: &str) -> bool {
    iss.trim_end_matches('/') == api_base.trim_end_matches('/')
}
