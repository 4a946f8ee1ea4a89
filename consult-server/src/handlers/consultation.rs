//! GET /visualization     : consultation dashboard (HTML)
//! GET /api/consultation  : the same consultation as JSON

use axum::{
    extract::State,
    http::HeaderMap,
    response::{Html, Json},
};
use std::sync::Arc;

use crate::error::{ApiError, ConsultError};
use crate::page;
use crate::pipeline::{run_consultation, Consultation};
use crate::session::{session_id, SmartContext};
use crate::AppState;

async fn authorized_context(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<SmartContext, ConsultError> {
    let context = match session_id(headers) {
        Some(id) => state.sessions.context(&id).await,
        None => None,
    };
    context.ok_or_else(|| {
        ConsultError::Unauthorized(
            "No authorized session. Launch the app from the EHR to open a patient.".to_string(),
        )
    })
}

pub async fn visualization(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Html<String>, ConsultError> {
    let context = authorized_context(&state, &headers).await?;
    let consultation = run_consultation(&state.services, &context).await?;
    Ok(Html(page::render_consultation(&consultation)))
}

pub async fn api_consultation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Consultation>, ApiError> {
    let context = authorized_context(&state, &headers).await?;
    let consultation = run_consultation(&state.services, &context).await?;
    Ok(Json(consultation))
}
