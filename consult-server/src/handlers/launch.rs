//! SMART EHR launch
//!
//! GET /launch        : start authorization, redirect to the EHR
//! GET /redirect_uri  : authorization callback, exchange the code

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use consult_upstream::ClientCredentials;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ConsultError;
use crate::session::{session_cookie, session_id, PendingAuthorization, SmartContext};
use crate::smart::{authorize_url, issuer_matches};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LaunchParams {
    pub launch: Option<String>,
    pub iss: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RedirectParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /launch
pub async fn launch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<LaunchParams>,
) -> Result<Response, ConsultError> {
    let smart = &state.config.smart;

    if let Some(previous) = session_id(&headers) {
        state.sessions.clear(&previous).await;
    }

    if let Some(iss) = params.iss.as_deref()
        && !issuer_matches(iss, &smart.api_base)
    {
        return Err(ConsultError::Launch(format!(
            "This app is not registered with the FHIR server {}",
            iss
        )));
    }

    let endpoints = state.services.smart.discover(&smart.api_base).await?;
    let auth_state = uuid::Uuid::new_v4().simple().to_string();
    let url = authorize_url(
        &endpoints.authorization_endpoint,
        smart,
        &auth_state,
        params.launch.as_deref(),
    )?;

    let id = state
        .sessions
        .begin(PendingAuthorization {
            state: auth_state,
            token_endpoint: endpoints.token_endpoint,
        })
        .await;

    tracing::info!(
        ehr_launch = params.launch.is_some(),
        authorization_endpoint = %endpoints.authorization_endpoint,
        "Redirecting to SMART authorization"
    );

    Ok((
        [(header::SET_COOKIE, session_cookie(&id))],
        Redirect::to(url.as_str()),
    )
        .into_response())
}

/// GET /redirect_uri
pub async fn redirect_uri(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<RedirectParams>,
) -> Result<Response, ConsultError> {
    if let Some(error) = params.error {
        let detail = params.error_description.unwrap_or(error);
        return Err(ConsultError::Launch(format!(
            "Authorization was not granted: {}",
            detail
        )));
    }

    let id = session_id(&headers).ok_or_else(|| {
        ConsultError::Launch("No launch is in progress. Start the app from the EHR.".to_string())
    })?;

    let (Some(code), Some(auth_state)) = (params.code, params.state) else {
        return Err(ConsultError::Launch(
            "Authorization response is missing code or state".to_string(),
        ));
    };

    let pending = state
        .sessions
        .take_pending(&id, &auth_state)
        .await
        .ok_or_else(|| {
            ConsultError::Launch(
                "Authorization does not match this launch. Start the app again from the EHR."
                    .to_string(),
            )
        })?;

    let smart = &state.config.smart;
    let credentials = ClientCredentials {
        client_id: smart.client_id.clone(),
        client_secret: smart.client_secret.clone(),
    };
    let token = state
        .services
        .smart
        .exchange_code(&pending.token_endpoint, &code, &smart.redirect_uri, &credentials)
        .await?;

    let patient_id = token
        .patient
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| {
            ConsultError::Launch("The authorization grant has no patient context".to_string())
        })?;

    tracing::info!(patient = %patient_id, scope = ?token.scope, "SMART launch authorized");

    state
        .sessions
        .authorize(
            &id,
            SmartContext {
                api_base: smart.api_base.clone(),
                access_token: token.access_token,
                patient_id,
                scope: token.scope,
            },
            token.expires_in,
        )
        .await;

    Ok(Redirect::to("/visualization").into_response())
}
