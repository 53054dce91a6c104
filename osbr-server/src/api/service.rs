//! Service API handlers.
//!
//! These endpoints let a backend outside this process publish stream
//! updates. In hardened mode they require the `Osbr-Secret` header.
//!
//! # Endpoints
//!
//! - `POST /service/tasks/{task_id}`       – publish a `TaskUpdate`
//! - `POST /service/versions/{lookup_id}`  – publish a `VersionUpdate`

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use kanau::processor::Processor;
use osbr_core::consumers::{PublishTaskUpdate, PublishVersionUpdate};
use osbr_sdk::objects::{ProduceReport, ProduceStatus, TaskUpdate, VersionUpdate};

use crate::api::extractors::ServiceAuth;
use crate::state::AppState;

/// Build the Service API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/service/tasks/{task_id}", post(publish_task_update))
        .route("/service/versions/{lookup_id}", post(publish_version_update))
}

/// `POST /service/tasks/{task_id}`
async fn publish_task_update(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    Path(task_id): Path<String>,
    Json(update): Json<TaskUpdate>,
) -> impl IntoResponse {
    let Ok(status) = state
        .tasks
        .process(PublishTaskUpdate { task_id, update })
        .await;
    report(status)
}

/// `POST /service/versions/{lookup_id}`
async fn publish_version_update(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    Path(lookup_id): Path<String>,
    Json(update): Json<VersionUpdate>,
) -> impl IntoResponse {
    let Ok(status) = state
        .versions
        .process(PublishVersionUpdate { lookup_id, update })
        .await;
    report(status)
}

fn report(status: ProduceStatus) -> (StatusCode, Json<ProduceReport>) {
    let code = match status {
        ProduceStatus::Delivered => StatusCode::OK,
        ProduceStatus::Buffered => StatusCode::ACCEPTED,
        ProduceStatus::Failed => StatusCode::BAD_GATEWAY,
        ProduceStatus::InvalidIdentifier => StatusCode::BAD_REQUEST,
    };
    (code, Json(ProduceReport { status }))
}
