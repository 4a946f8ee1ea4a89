use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{Result, UpstreamError};

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Shared HTTP client for every upstream
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("climate-consult/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|source| UpstreamError::http("http-client", source))
}

/// Send a request and decode a JSON body. Non-2xx statuses are errors.
pub(crate) async fn send_json<T: DeserializeOwned>(
    service: &'static str,
    request: RequestBuilder,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|source| UpstreamError::http(service, source))?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|source| UpstreamError::http(service, source))?;

    if !status.is_success() {
        let mut text = String::from_utf8_lossy(&body).into_owned();
        if text.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        return Err(UpstreamError::Status {
            service,
            status,
            body: text,
        });
    }

    serde_json::from_slice(&body).map_err(|source| UpstreamError::Decode { service, source })
}

/// Base URL without a trailing slash, so paths can be appended with `/`
pub(crate) fn trim_base(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}
