use thiserror::Error;

/// How a record failure is surfaced to the clinician.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A precondition on the record is not met; the render is prevented.
    Prevented,
    /// The record could not be interpreted; details stay in the server log.
    Malformed,
}

/// Failures while reading a patient's demographics or clinical history.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("No address found for the patient")]
    NoAddress,

    #[error("Multiple addresses detected ({count}), expected exactly one")]
    MultipleAddresses { count: usize },

    #[error("Patient has no usable name")]
    MissingName,

    #[error("Invalid birth date: {value}")]
    InvalidBirthDate { value: String },

    #[error("Encounter {id} has no human-readable element to serve as a description")]
    MissingDescription { id: String },

    #[error("MedicationAdministration {id} has no human-readable medication element")]
    MissingMedication { id: String },

    #[error("Invalid {resource_type} resource: {message}")]
    InvalidResource {
        resource_type: String,
        message: String,
    },
}

impl RecordError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordError::NoAddress | RecordError::MultipleAddresses { .. } => ErrorKind::Prevented,
            _ => ErrorKind::Malformed,
        }
    }

    /// Stable machine-readable code for the failure.
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::NoAddress => "no-address",
            RecordError::MultipleAddresses { .. } => "multiple-addresses",
            RecordError::MissingName => "missing-name",
            RecordError::InvalidBirthDate { .. } => "invalid-birth-date",
            RecordError::MissingDescription { .. } => "missing-description",
            RecordError::MissingMedication { .. } => "missing-medication",
            RecordError::InvalidResource { .. } => "invalid-resource",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognized timestamp: {0}")]
pub struct TimestampError(pub String);

pub type Result<T> = std::result::Result<T, RecordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_errors_are_prevented() {
        assert_eq!(RecordError::NoAddress.kind(), ErrorKind::Prevented);
        assert_eq!(
            RecordError::MultipleAddresses { count: 2 }.kind(),
            ErrorKind::Prevented
        );
    }

    #[test]
    fn test_parsing_errors_are_malformed() {
        let err = RecordError::MissingDescription {
            id: "enc-1".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.code(), "missing-description");
        assert!(err.to_string().contains("enc-1"));
    }
}
