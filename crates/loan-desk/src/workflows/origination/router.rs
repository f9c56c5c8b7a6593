use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    ApplicationDraft, ApplicationId, ApplicationStatusView, Scenario, UnderwritingDecision,
};
use super::navigation::Navigator;
use super::service::{OriginationError, OriginationService};
use super::storage::StorageBackend;
use super::store::ApplicationFilter;

/// Intake payload: a complete draft plus the demo scenario label.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub draft: ApplicationDraft,
    #[serde(default)]
    pub scenario: Scenario,
}

/// Router builder exposing intake and staff endpoints.
pub fn application_router<S, N>(service: Arc<OriginationService<S, N>>) -> Router
where
    S: StorageBackend + 'static,
    N: Navigator + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(submit_handler::<S, N>).get(list_handler::<S, N>),
        )
        .route("/api/v1/applications/:id", get(status_handler::<S, N>))
        .route(
            "/api/v1/applications/:id/underwriting",
            post(underwriting_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:id/decision",
            post(decision_handler::<S, N>),
        )
        .route("/api/v1/applications/:id/issue", post(issue_handler::<S, N>))
        .with_state(service)
}

fn error_response(error: OriginationError) -> Response {
    let status = error.status_code();
    let payload = match &error {
        OriginationError::Validation(errors) => json!({
            "error": "application is incomplete",
            "fields": errors,
        }),
        other => json!({ "error": other.to_string() }),
    };
    (status, Json(payload)).into_response()
}

fn view_response(status: StatusCode, view: ApplicationStatusView) -> Response {
    (status, Json(view)).into_response()
}

pub(crate) async fn submit_handler<S, N>(
    State(service): State<Arc<OriginationService<S, N>>>,
    Json(request): Json<SubmitRequest>,
) -> Response
where
    S: StorageBackend + 'static,
    N: Navigator + 'static,
{
    match service.submit_draft(&request.draft, request.scenario) {
        Ok(record) => view_response(StatusCode::ACCEPTED, record.status_view()),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<S, N>(
    State(service): State<Arc<OriginationService<S, N>>>,
    Query(filter): Query<ApplicationFilter>,
) -> Response
where
    S: StorageBackend + 'static,
    N: Navigator + 'static,
{
    match service.list(&filter) {
        Ok(records) => {
            let views: Vec<ApplicationStatusView> =
                records.iter().map(|record| record.status_view()).collect();
            let payload = json!({
                "total": views.len(),
                "applications": views,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<S, N>(
    State(service): State<Arc<OriginationService<S, N>>>,
    Path(id): Path<String>,
) -> Response
where
    S: StorageBackend + 'static,
    N: Navigator + 'static,
{
    match service.get(&ApplicationId(id)) {
        Ok(record) => view_response(StatusCode::OK, record.status_view()),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn underwriting_handler<S, N>(
    State(service): State<Arc<OriginationService<S, N>>>,
    Path(id): Path<String>,
) -> Response
where
    S: StorageBackend + 'static,
    N: Navigator + 'static,
{
    match service.start_underwriting(&ApplicationId(id)) {
        Ok(record) => view_response(StatusCode::OK, record.status_view()),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn decision_handler<S, N>(
    State(service): State<Arc<OriginationService<S, N>>>,
    Path(id): Path<String>,
    Json(decision): Json<UnderwritingDecision>,
) -> Response
where
    S: StorageBackend + 'static,
    N: Navigator + 'static,
{
    match service.record_decision(&ApplicationId(id), decision) {
        Ok(record) => view_response(StatusCode::OK, record.status_view()),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn issue_handler<S, N>(
    State(service): State<Arc<OriginationService<S, N>>>,
    Path(id): Path<String>,
) -> Response
where
    S: StorageBackend + 'static,
    N: Navigator + 'static,
{
    match service.issue(&ApplicationId(id)) {
        Ok(record) => view_response(StatusCode::OK, record.status_view()),
        Err(error) => error_response(error),
    }
}
