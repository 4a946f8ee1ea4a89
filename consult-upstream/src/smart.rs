//! SMART App Launch: endpoint discovery and authorization-code exchange.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, UpstreamError};
use crate::http::{send_json, trim_base};

const SERVICE: &str = "smart-auth";
const OAUTH_URIS_EXTENSION: &str =
    "http://fhir-registry.smarthealthit.org/StructureDefinition/oauth-uris";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SmartEndpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

/// Token endpoint response with SMART launch context
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub patient: Option<String>,
}

/// Confidential or public client credentials for the token exchange
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
}

pub struct SmartAuthClient {
    http: Client,
}

impl SmartAuthClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Authorization and token endpoints of the FHIR server.
    ///
    /// Reads `.well-known/smart-configuration`; servers that only publish the
    /// oauth-uris extension in their CapabilityStatement are read from `metadata`.
    pub async fn discover(&self, api_base: &str) -> Result<SmartEndpoints> {
        let base = trim_base(api_base);
        let well_known = self
            .http
            .get(format!("{}/.well-known/smart-configuration", base))
            .header(reqwest::header::ACCEPT, "application/json");

        match send_json::<SmartEndpoints>(SERVICE, well_known).await {
            Ok(endpoints) => return Ok(endpoints),
            Err(e) => {
                tracing::debug!(error = %e, "SMART configuration unavailable, reading metadata")
            }
        }

        let metadata = self
            .http
            .get(format!("{}/metadata", base))
            .header(reqwest::header::ACCEPT, "application/fhir+json");
        let capability: Value = send_json(SERVICE, metadata).await?;
        endpoints_from_capability(&capability).ok_or_else(|| {
            UpstreamError::malformed(SERVICE, "no SMART authorization endpoints advertised")
        })
    }

    /// Exchange an authorization code for an access token
    pub async fn exchange_code(
        &self,
        token_endpoint: &str,
        code: &str,
        redirect_uri: &str,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];
        let mut request = self.http.post(token_endpoint);
        match credentials.client_secret.as_deref() {
            Some(secret) => {
                request = request.basic_auth(&credentials.client_id, Some(secret));
            }
            None => form.push(("client_id", credentials.client_id.as_str())),
        }
        send_json(SERVICE, request.form(&form)).await
    }
}

fn endpoints_from_capability(capability: &Value) -> Option<SmartEndpoints> {
    let extensions = capability
        .get("rest")?
        .as_array()?
        .iter()
        .filter_map(|rest| rest.pointer("/security/extension"))
        .filter_map(Value::as_array)
        .flatten()
        .find(|ext| ext.get("url").and_then(Value::as_str) == Some(OAUTH_URIS_EXTENSION))?
        .get("extension")?
        .as_array()?;

    let uri = |name: &str| {
        extensions
            .iter()
            .find(|e| e.get("url").and_then(Value::as_str) == Some(name))
            .and_then(|e| e.get("valueUri"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Some(SmartEndpoints {
        authorization_endpoint: uri("authorize")?,
        token_endpoint: uri("token")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoints_from_capability_statement() {
        let capability = json!({
            "resourceType": "CapabilityStatement",
            "rest": [{
                "mode": "server",
                "security": {
                    "extension": [{
                        "url": OAUTH_URIS_EXTENSION,
                        "extension": [
                            {"url": "token", "valueUri": "https://ehr/token"},
                            {"url": "authorize", "valueUri": "https://ehr/authorize"}
                        ]
                    }]
                }
            }]
        });
        let endpoints = endpoints_from_capability(&capability).unwrap();
        assert_eq!(endpoints.authorization_endpoint, "https://ehr/authorize");
        assert_eq!(endpoints.token_endpoint, "https://ehr/token");
    }

    #[test]
    fn test_capability_without_security() {
        let capability = json!({
            "resourceType": "CapabilityStatement",
            "rest": [{"mode": "server"}]
        });
        assert!(endpoints_from_capability(&capability).is_none());
    }
}
