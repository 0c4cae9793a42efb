use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use usage_app::{AnalyticsService, CostParams, HistoryParams, ImportRunParams, RequestParams};

use crate::{errors::HttpError, state::HttpState};

#[derive(Debug, Default, Deserialize)]
pub struct EmptyRequest {}

/// Runs a synchronous analytics query off the async runtime.
async fn with_analytics<T, F>(state: &HttpState, query: F) -> Result<T, HttpError>
where
    T: Send + 'static,
    F: FnOnce(&AnalyticsService) -> usage_app::Result<T> + Send + 'static,
{
    let analytics = state.app.services.analytics.clone();
    let result = tokio::task::spawn_blocking(move || query(&analytics))
        .await
        .map_err(|err| {
            HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None)
        })??;
    Ok(result)
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn import(
    State(state): State<HttpState>,
    Json(_): Json<EmptyRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let run = state.app.services.import.run().await?;
    Ok(Json(run))
}

pub async fn import_status(
    State(state): State<HttpState>,
    Json(_): Json<EmptyRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let response = with_analytics(&state, |analytics| analytics.get_import_status()).await?;
    Ok(Json(response))
}

pub async fn import_history(
    State(state): State<HttpState>,
    Json(req): Json<HistoryParams>,
) -> Result<impl IntoResponse, HttpError> {
    let response = with_analytics(&state, move |analytics| analytics.import_history(&req)).await?;
    Ok(Json(response))
}

pub async fn import_run(
    State(state): State<HttpState>,
    Json(req): Json<ImportRunParams>,
) -> Result<impl IntoResponse, HttpError> {
    let response = with_analytics(&state, move |analytics| analytics.import_run(req.id)).await?;
    Ok(Json(response))
}

pub async fn costs(
    State(state): State<HttpState>,
    Json(req): Json<CostParams>,
) -> Result<impl IntoResponse, HttpError> {
    let response =
        with_analytics(&state, move |analytics| analytics.get_costs(&req.from, &req.to)).await?;
    Ok(Json(response))
}

pub async fn requests(
    State(state): State<HttpState>,
    Json(req): Json<RequestParams>,
) -> Result<impl IntoResponse, HttpError> {
    let response = with_analytics(&state, move |analytics| analytics.get_requests(&req)).await?;
    Ok(Json(response))
}

pub async fn models(
    State(state): State<HttpState>,
    Json(_): Json<EmptyRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let response = with_analytics(&state, |analytics| analytics.models()).await?;
    Ok(Json(response))
}
