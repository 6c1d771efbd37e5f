use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use hypervisor_core::{ListParams, ListResult, ServiceError};

use crate::api::AppState;
use crate::model::{CreateMessage, Message};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/messages", get(retrieve).post(create))
        .route("/messages/unread", get(unread))
        .route("/messages/{id}", get(fetch).delete(remove))
}

#[derive(Debug, Deserialize)]
struct ReceiverQuery {
    #[serde(default)]
    receiver: Option<String>,
}

#[derive(Debug, Serialize)]
struct Unread {
    unread: usize,
}

async fn retrieve(
    State(svc): State<AppState>,
    Query(query): Query<ReceiverQuery>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<Message>>, ServiceError> {
    Ok(Json(svc.retrieve_messages(query.receiver.as_deref(), &params)?))
}

async fn create(
    State(svc): State<AppState>,
    Json(input): Json<CreateMessage>,
) -> Result<(StatusCode, Json<Message>), ServiceError> {
    Ok((StatusCode::CREATED, Json(svc.create_message(input)?)))
}

async fn unread(
    State(svc): State<AppState>,
    Query(query): Query<ReceiverQuery>,
) -> Result<Json<Unread>, ServiceError> {
    let receiver = query.receiver.unwrap_or_default();
    if receiver.trim().is_empty() {
        return Err(ServiceError::Validation("receiver must not be blank".into()));
    }
    Ok(Json(Unread { unread: svc.unread_messages(&receiver)? }))
}

/// Reading a message marks it read.
async fn fetch(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, ServiceError> {
    Ok(Json(svc.fetch_message(&id)?))
}

async fn remove(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.remove_message(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
