//! Human-readable summaries of Condition, Encounter and
//! MedicationAdministration records.

use serde::Serialize;
use std::fmt;

use crate::error::{RecordError, Result};
use crate::resource::{CodeableConcept, Coding, Reference, Resource};

const UNKNOWN_STATUS: &str = "Unknown";

/// Where a record's display label came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "value", rename_all = "kebab-case")]
pub enum ClinicalLabel {
    Text(String),
    CodedDisplay(String),
    Absent,
}

impl ClinicalLabel {
    pub fn as_str(&self) -> &str {
        match self {
            ClinicalLabel::Text(s) | ClinicalLabel::CodedDisplay(s) => s,
            ClinicalLabel::Absent => "",
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ClinicalLabel::Absent)
    }
}

impl fmt::Display for ClinicalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CodeableConcept {
    /// `text` first, then the first coding that carries a display
    pub fn label(&self) -> ClinicalLabel {
        if let Some(text) = &self.text {
            return ClinicalLabel::Text(text.clone());
        }
        self.coding
            .iter()
            .find_map(|c| c.display.clone())
            .map(ClinicalLabel::CodedDisplay)
            .unwrap_or(ClinicalLabel::Absent)
    }

    /// Neither text nor any coding, e.g. `{}`
    fn is_empty(&self) -> bool {
        self.text.is_none() && self.coding.is_empty()
    }

    fn first_code(&self) -> Option<&str> {
        self.coding.first().and_then(|c| c.code.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionSummary {
    pub name: ClinicalLabel,
    pub clinical_status: String,
    pub verification_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncounterSummary {
    pub description: ClinicalLabel,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MedicationSummary {
    pub name: ClinicalLabel,
    pub status: String,
}

impl ConditionSummary {
    pub fn from_resource(condition: &Resource) -> Result<Self> {
        let name = condition
            .element::<CodeableConcept>("code")?
            .map(|c| c.label())
            .unwrap_or(ClinicalLabel::Absent);
        Ok(Self {
            name,
            clinical_status: status_code(condition, "clinicalStatus")?,
            verification_status: status_code(condition, "verificationStatus")?,
        })
    }
}

impl EncounterSummary {
    /// serviceType, then type, then class; an encounter with none of the
    /// three cannot be described.
    pub fn from_resource(encounter: &Resource) -> Result<Self> {
        let description = if let Some(service) = encounter
            .element::<CodeableConcept>("serviceType")?
            .filter(|c| !c.is_empty())
        {
            service.label()
        } else if let Some(types) = encounter
            .element::<Vec<CodeableConcept>>("type")?
            .map(|types| types.into_iter().filter(|c| !c.is_empty()).collect::<Vec<_>>())
            .filter(|t| !t.is_empty())
        {
            types
                .iter()
                .map(CodeableConcept::label)
                .find(|l| !l.is_absent())
                .unwrap_or(ClinicalLabel::Absent)
        } else if let Some(class) = encounter.element::<Coding>("class")? {
            class
                .display
                .map(ClinicalLabel::CodedDisplay)
                .unwrap_or(ClinicalLabel::Absent)
        } else {
            return Err(RecordError::MissingDescription {
                id: encounter.id_or_unknown().to_string(),
            });
        };

        Ok(Self {
            description,
            status: plain_status(encounter),
        })
    }
}

impl MedicationSummary {
    pub fn from_resource(administration: &Resource) -> Result<Self> {
        let name = if let Some(concept) =
            administration.element::<CodeableConcept>("medicationCodeableConcept")?
        {
            concept.label()
        } else if let Some(reference) =
            administration.element::<Reference>("medicationReference")?
        {
            reference
                .display
                .map(ClinicalLabel::Text)
                .unwrap_or(ClinicalLabel::Absent)
        } else {
            return Err(RecordError::MissingMedication {
                id: administration.id_or_unknown().to_string(),
            });
        };

        Ok(Self {
            name,
            status: plain_status(administration),
        })
    }
}

/// The patient's clinical history, each list ordered by status
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClinicalHistory {
    pub conditions: Vec<ConditionSummary>,
    pub encounters: Vec<EncounterSummary>,
    pub medication_administrations: Vec<MedicationSummary>,
}

impl ClinicalHistory {
    pub fn summarize(
        conditions: &[Resource],
        encounters: &[Resource],
        medication_administrations: &[Resource],
    ) -> Result<Self> {
        let mut conditions = conditions
            .iter()
            .map(ConditionSummary::from_resource)
            .collect::<Result<Vec<_>>>()?;
        conditions.sort_by(|a, b| a.clinical_status.cmp(&b.clinical_status));

        let mut encounters = encounters
            .iter()
            .map(EncounterSummary::from_resource)
            .collect::<Result<Vec<_>>>()?;
        encounters.sort_by(|a, b| a.status.cmp(&b.status));

        let mut medication_administrations = medication_administrations
            .iter()
            .map(MedicationSummary::from_resource)
            .collect::<Result<Vec<_>>>()?;
        medication_administrations.sort_by(|a, b| a.status.cmp(&b.status));

        tracing::debug!(
            conditions = conditions.len(),
            encounters = encounters.len(),
            medication_administrations = medication_administrations.len(),
            "Summarized clinical history"
        );

        Ok(Self {
            conditions,
            encounters,
            medication_administrations,
        })
    }
}

fn status_code(resource: &Resource, element: &str) -> Result<String> {
    Ok(resource
        .element::<CodeableConcept>(element)?
        .as_ref()
        .and_then(CodeableConcept::first_code)
        .unwrap_or(UNKNOWN_STATUS)
        .to_string())
}

fn plain_status(resource: &Resource) -> String {
    resource
        .str_element("status")
        .unwrap_or(UNKNOWN_STATUS)
        .to_string()
}

impl fmt::Display for ConditionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (clinical status: {}, verification status: {})",
            self.name, self.clinical_status, self.verification_status
        )
    }
}

impl fmt::Display for EncounterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status: {})", self.description, self.status)
    }
}

impl fmt::Display for MedicationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status: {})", self.name, self.status)
    }
}
