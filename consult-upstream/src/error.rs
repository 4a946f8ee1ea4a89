use thiserror::Error;

/// Failures talking to an external service. None of these are retried.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{service} response could not be decoded: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{service} response is malformed: {detail}")]
    Malformed {
        service: &'static str,
        detail: String,
    },

    #[error("Invalid URL for {service}: {detail}")]
    InvalidUrl {
        service: &'static str,
        detail: String,
    },
}

impl UpstreamError {
    pub fn service(&self) -> &'static str {
        match self {
            UpstreamError::Http { service, .. }
            | UpstreamError::Status { service, .. }
            | UpstreamError::Decode { service, .. }
            | UpstreamError::Malformed { service, .. }
            | UpstreamError::InvalidUrl { service, .. } => service,
        }
    }

    /// Transport failure. The request URL is dropped because query strings carry API keys.
    pub(crate) fn http(service: &'static str, source: reqwest::Error) -> Self {
        UpstreamError::Http {
            service,
            source: source.without_url(),
        }
    }

    pub(crate) fn malformed(service: &'static str, detail: impl Into<String>) -> Self {
        UpstreamError::Malformed {
            service,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UpstreamError>;
