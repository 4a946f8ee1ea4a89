//! Patient demographics derived from a single Patient resource.

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::{RecordError, Result};
use crate::resource::{Address, HumanName, Resource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Other,
    Unknown,
}

impl Sex {
    /// Map the FHIR administrative gender code
    pub fn from_gender(gender: Option<&str>) -> Self {
        match gender {
            Some("male") => Sex::Male,
            Some("female") => Sex::Female,
            Some("other") => Sex::Other,
            _ => Sex::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Other => "other",
            Sex::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientDemographics {
    pub name: String,
    pub sex: Sex,
    pub birth_date: Option<BirthDate>,
    pub address: String,
}

impl PatientDemographics {
    /// Extract demographics from a Patient resource.
    ///
    /// The address is checked first: a patient without exactly one address
    /// cannot be located, whatever else the record holds.
    pub fn from_patient(patient: &Resource) -> Result<Self> {
        let addresses: Vec<Address> = patient.element("address")?.unwrap_or_default();
        let address = match addresses.as_slice() {
            [] => return Err(RecordError::NoAddress),
            [single] => format_address(single),
            many => {
                return Err(RecordError::MultipleAddresses { count: many.len() });
            }
        };

        let names: Vec<HumanName> = patient.element("name")?.unwrap_or_default();
        let name = select_name(&names).ok_or(RecordError::MissingName)?;

        let birth_date = patient
            .str_element("birthDate")
            .map(BirthDate::parse)
            .transpose()?;

        Ok(Self {
            name,
            sex: Sex::from_gender(patient.str_element("gender")),
            birth_date,
            address,
        })
    }

    pub fn birth_date_display(&self) -> String {
        self.birth_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// The first `official` name, otherwise the first name on file
fn select_name(names: &[HumanName]) -> Option<String> {
    names
        .iter()
        .find(|n| n.name_use.as_deref() == Some("official"))
        .or_else(|| names.first())
        .and_then(render_name)
}

fn render_name(name: &HumanName) -> Option<String> {
    if let Some(text) = name.text.as_deref().filter(|t| !t.trim().is_empty()) {
        return Some(text.to_string());
    }
    let parts: Vec<&str> = name
        .given
        .iter()
        .map(String::as_str)
        .chain(name.family.as_deref())
        .filter(|p| !p.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

/// `text` when present, otherwise the populated components joined by ", "
pub fn format_address(address: &Address) -> String {
    if let Some(text) = address.text.as_deref().filter(|t| !t.trim().is_empty()) {
        return text.to_string();
    }
    let lines = address
        .line
        .iter()
        .filter(|l| !l.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    [
        Some(lines.as_str()),
        address.city.as_deref(),
        address.district.as_deref(),
        address.state.as_deref(),
        address.postal_code.as_deref(),
        address.country.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|p| !p.is_empty())
    .collect::<Vec<_>>()
    .join(", ")
}

/// A FHIR `date`, at the precision the record gives it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BirthDate {
    Year(i32),
    YearMonth(i32, u32),
    Day(NaiveDate),
}

impl BirthDate {
    /// Parse `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || RecordError::InvalidBirthDate {
            value: value.to_string(),
        };

        match value.split('-').collect::<Vec<_>>().as_slice() {
            [year] if all_digits(year, 4) => {
                year.parse().map(BirthDate::Year).map_err(|_| invalid())
            }
            [year, month] if all_digits(year, 4) && all_digits(month, 2) => {
                let year: i32 = year.parse().map_err(|_| invalid())?;
                let month: u32 = month.parse().map_err(|_| invalid())?;
                NaiveDate::from_ymd_opt(year, month, 1)
                    .map(|_| BirthDate::YearMonth(year, month))
                    .ok_or_else(invalid)
            }
            [_, _, _] => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(BirthDate::Day)
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }

    pub fn year(&self) -> i32 {
        match self {
            BirthDate::Year(year) | BirthDate::YearMonth(year, _) => *year,
            BirthDate::Day(date) => date.year(),
        }
    }
}

fn all_digits(part: &str, len: usize) -> bool {
    part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for BirthDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BirthDate::Year(year) => write!(f, "{:04}", year),
            BirthDate::YearMonth(year, month) => write!(f, "{:04}-{:02}", year, month),
            BirthDate::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for BirthDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient(body: serde_json::Value) -> Resource {
        let mut value = json!({"resourceType": "Patient", "id": "p1"});
        if let (Some(obj), Some(extra)) = (value.as_object_mut(), body.as_object()) {
            obj.extend(extra.clone());
        }
        Resource::from_value(value).unwrap()
    }

    #[test]
    fn test_full_demographics() {
        let p = patient(json!({
            "name": [
                {"use": "usual", "given": ["Jim"], "family": "Smith"},
                {"use": "official", "given": ["James", "T."], "family": "Smith"}
            ],
            "gender": "male",
            "birthDate": "1970-04-02",
            "address": [{
                "line": ["1 Main St", "Apt 2"],
                "city": "Boise",
                "state": "ID",
                "postalCode": "83702",
                "country": "US"
            }]
        }));
        let d = PatientDemographics::from_patient(&p).unwrap();
        assert_eq!(d.name, "James T. Smith");
        assert_eq!(d.sex, Sex::Male);
        assert_eq!(d.birth_date_display(), "1970-04-02");
        assert_eq!(d.address, "1 Main St, Apt 2, Boise, ID, 83702, US");
    }

    #[test]
    fn test_name_text_and_address_text_win() {
        let p = patient(json!({
            "name": [{"text": "Dr. Ada Lovelace", "given": ["Ada"], "family": "King"}],
            "address": [{"text": "221B Baker Street, London", "city": "Elsewhere"}]
        }));
        let d = PatientDemographics::from_patient(&p).unwrap();
        assert_eq!(d.name, "Dr. Ada Lovelace");
        assert_eq!(d.address, "221B Baker Street, London");
        assert_eq!(d.sex, Sex::Unknown);
        assert_eq!(d.birth_date_display(), "Unknown");
    }

    #[test]
    fn test_address_count_boundaries() {
        let none = patient(json!({"name": [{"family": "A"}]}));
        assert_eq!(
            PatientDemographics::from_patient(&none).unwrap_err(),
            RecordError::NoAddress
        );

        let empty = patient(json!({"name": [{"family": "A"}], "address": []}));
        assert_eq!(
            PatientDemographics::from_patient(&empty).unwrap_err(),
            RecordError::NoAddress
        );

        let two = patient(json!({
            "name": [{"family": "A"}],
            "address": [{"city": "X"}, {"city": "Y"}]
        }));
        assert_eq!(
            PatientDemographics::from_patient(&two).unwrap_err(),
            RecordError::MultipleAddresses { count: 2 }
        );

        let one = patient(json!({"name": [{"family": "A"}], "address": [{"city": "X"}]}));
        assert_eq!(PatientDemographics::from_patient(&one).unwrap().address, "X");
    }

    #[test]
    fn test_missing_name() {
        let p = patient(json!({"address": [{"city": "X"}]}));
        assert_eq!(
            PatientDemographics::from_patient(&p).unwrap_err(),
            RecordError::MissingName
        );
    }

    #[test]
    fn test_partial_and_invalid_birth_dates() {
        let partial = patient(json!({
            "name": [{"family": "A"}],
            "address": [{"city": "X"}],
            "birthDate": "1985-06"
        }));
        let d = PatientDemographics::from_patient(&partial).unwrap();
        assert_eq!(d.birth_date, Some(BirthDate::YearMonth(1985, 6)));
        assert_eq!(d.birth_date_display(), "1985-06");
        assert_eq!(serde_json::to_value(&d).unwrap()["birth_date"], "1985-06");

        let invalid = patient(json!({
            "name": [{"family": "A"}],
            "address": [{"city": "X"}],
            "birthDate": "not a date"
        }));
        assert!(matches!(
            PatientDemographics::from_patient(&invalid),
            Err(RecordError::InvalidBirthDate { .. })
        ));
    }

    #[test]
    fn test_birth_date_keeps_precision() {
        assert_eq!(BirthDate::parse("1962").unwrap().to_string(), "1962");
        assert_eq!(BirthDate::parse("1962").unwrap().year(), 1962);
        assert_eq!(BirthDate::parse("2001-12-31").unwrap().to_string(), "2001-12-31");
        assert!(BirthDate::parse("1985-13").is_err());
        assert!(BirthDate::parse("1985-6").is_err());
        assert!(BirthDate::parse("2001-02-30").is_err());
    }
}
