use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use hypervisor_core::{ListParams, ListResult, ServiceError};

use crate::api::AppState;
use crate::model::{LogEntry, LogKind, RecordLog};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/logs", get(retrieve).post(record).delete(clear))
        .route("/logs/{id}", get(fetch).delete(remove))
}

#[derive(Debug, Deserialize)]
struct KindQuery {
    #[serde(default)]
    kind: Option<LogKind>,
}

#[derive(Debug, Serialize)]
struct Cleared {
    removed: u64,
}

async fn retrieve(
    State(svc): State<AppState>,
    Query(query): Query<KindQuery>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<LogEntry>>, ServiceError> {
    Ok(Json(svc.retrieve_logs(query.kind, &params)?))
}

async fn record(
    State(svc): State<AppState>,
    Json(input): Json<RecordLog>,
) -> Result<(StatusCode, Json<LogEntry>), ServiceError> {
    Ok((StatusCode::CREATED, Json(svc.record_log(input)?)))
}

/// Without `kind`, every log is removed.
async fn clear(
    State(svc): State<AppState>,
    Query(query): Query<KindQuery>,
) -> Result<Json<Cleared>, ServiceError> {
    Ok(Json(Cleared { removed: svc.clear_logs(query.kind)? }))
}

async fn fetch(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LogEntry>, ServiceError> {
    Ok(Json(svc.fetch_log(&id)?))
}

async fn remove(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.remove_log(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
