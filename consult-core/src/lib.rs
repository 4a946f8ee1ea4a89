//! Domain model for the climate consultation dashboard: FHIR record views,
//! environmental series, chart specifications and the consultation prompt.

pub mod chart;
pub mod clinical;
pub mod demographics;
pub mod environment;
pub mod error;
pub mod location;
pub mod prompt;
pub mod resource;
pub mod timestamp;

pub use chart::Figure;
pub use clinical::{
    ClinicalHistory, ClinicalLabel, ConditionSummary, EncounterSummary, MedicationSummary,
};
pub use demographics::{BirthDate, PatientDemographics, Sex};
pub use environment::{
    merge, AqiSeries, EnvironmentalSample, EnvironmentalTable, WeatherRow, WeatherSource,
    WeatherTable,
};
pub use error::{ErrorKind, RecordError, Result, TimestampError};
pub use location::{map_embed_url, Coordinates};
pub use resource::{Bundle, Resource};
pub use timestamp::Timestamp;
