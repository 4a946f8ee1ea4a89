use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RecordError;

/// A FHIR resource as returned by the clinical record server.
///
/// Only the envelope is typed; elements are read on demand with
/// [`Resource::element`] so records are never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// All other fields are stored here
    #[serde(flatten)]
    pub rest: Value,
}

impl Resource {
    /// Parse a resource from a JSON value
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Parse a resource from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn id_or_unknown(&self) -> &str {
        self.id.as_deref().unwrap_or("(no id)")
    }

    /// Decode a top-level element. Absent or `null` elements yield `None`;
    /// elements of the wrong shape are an error.
    pub fn element<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, RecordError> {
        match self.rest.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value).map(Some).map_err(|e| {
                RecordError::InvalidResource {
                    resource_type: self.resource_type.clone(),
                    message: format!("{}: {}", name, e),
                }
            }),
        }
    }

    /// Read a top-level string element
    pub fn str_element(&self, name: &str) -> Option<&str> {
        self.rest.get(name).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default)]
    pub coding: Vec<Coding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub name_use: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default)]
    pub given: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub line: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// A searchset page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub link: Vec<BundleLink>,
    #[serde(default)]
    pub entry: Option<Vec<BundleEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleEntry {
    #[serde(default)]
    pub resource: Option<Resource>,
}

impl Bundle {
    /// URL of the following page, if any
    pub fn next_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.relation == "next")
            .map(|l| l.url.as_str())
    }

    /// Resources on this page in server order. A page without `entry` is empty.
    pub fn into_resources(self) -> Vec<Resource> {
        self.entry
            .unwrap_or_default()
            .into_iter()
            .filter_map(|e| e.resource)
            .collect()
    }
}
