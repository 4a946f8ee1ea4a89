//! Read-only access to the patient's record on the FHIR server.

use consult_core::{Bundle, Resource};
use reqwest::{Client, Url};
use std::collections::HashSet;

use crate::error::{Result, UpstreamError};
use crate::http::send_json;

const SERVICE: &str = "fhir";
const FHIR_JSON: &str = "application/fhir+json";

/// Clinical resource types searched by patient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClinicalResourceType {
    Condition,
    Encounter,
    MedicationAdministration,
}

impl ClinicalResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClinicalResourceType::Condition => "Condition",
            ClinicalResourceType::Encounter => "Encounter",
            ClinicalResourceType::MedicationAdministration => "MedicationAdministration",
        }
    }
}

/// FHIR REST client authorized with a SMART access token
#[derive(Clone)]
pub struct FhirClient {
    http: Client,
    base_url: Url,
    access_token: String,
}

impl FhirClient {
    pub fn new(http: Client, api_base: &str, access_token: impl Into<String>) -> Result<Self> {
        // A trailing slash keeps the last path segment when joining relative references
        let normalized = format!("{}/", api_base.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| UpstreamError::InvalidUrl {
            service: SERVICE,
            detail: format!("{}: {}", api_base, e),
        })?;
        Ok(Self {
            http,
            base_url,
            access_token: access_token.into(),
        })
    }

    fn resolve(&self, reference: &str) -> Result<Url> {
        self.base_url
            .join(reference)
            .map_err(|e| UpstreamError::InvalidUrl {
                service: SERVICE,
                detail: format!("{}: {}", reference, e),
            })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let request = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, FHIR_JSON);
        send_json(SERVICE, request).await
    }

    /// GET Patient/{id}
    pub async fn read_patient(&self, patient_id: &str) -> Result<Resource> {
        if !is_valid_id(patient_id) {
            return Err(UpstreamError::InvalidUrl {
                service: SERVICE,
                detail: format!("invalid patient id {:?}", patient_id),
            });
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl {
                service: SERVICE,
                detail: format!("{} cannot be a base", self.base_url),
            })?
            .pop_if_empty()
            .push("Patient")
            .push(patient_id);
        let resource: Resource = self.get(url).await?;
        if resource.resource_type != "Patient" {
            return Err(UpstreamError::malformed(
                SERVICE,
                format!("expected Patient, got {}", resource.resource_type),
            ));
        }
        Ok(resource)
    }

    /// Every resource of `resource_type` for the patient, following `next`
    /// links until the last page. Resources keep server page order.
    pub async fn search_all(
        &self,
        resource_type: ClinicalResourceType,
        patient_id: &str,
    ) -> Result<Vec<Resource>> {
        let mut url = self.resolve(resource_type.as_str())?;
        url.query_pairs_mut().append_pair("patient", patient_id);

        let mut resources = Vec::new();
        let mut visited = HashSet::new();
        let mut pages = 0usize;

        loop {
            if !visited.insert(url.to_string()) {
                return Err(UpstreamError::malformed(
                    SERVICE,
                    format!("pagination loop at {}", url),
                ));
            }

            let bundle: Bundle = self.get(url).await?;
            pages += 1;
            let next = bundle.next_link().map(str::to_string);
            resources.extend(bundle.into_resources());

            match next {
                Some(link) => url = self.resolve(&link)?,
                None => break,
            }
        }

        tracing::debug!(
            resource_type = resource_type.as_str(),
            pages,
            count = resources.len(),
            "Fetched clinical resources"
        );
        Ok(resources)
    }
}

/// FHIR `id`: 1 to 64 of `[A-Za-z0-9.-]`, and not a dot segment
fn is_valid_id(id: &str) -> bool {
    (1..=64).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
        && id != "."
        && id != ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fhir_id_syntax() {
        assert!(is_valid_id("p1"));
        assert!(is_valid_id("smart-1032702.v2"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id(".."));
        assert!(!is_valid_id("a/b"));
        assert!(!is_valid_id("p1?_format=xml"));
        assert!(!is_valid_id(&"x".repeat(65)));
    }
}
