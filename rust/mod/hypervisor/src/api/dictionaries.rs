use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use hypervisor_core::{ListParams, ListResult, ServiceError};

use crate::api::{AppState, Exists};
use crate::model::{CreateDictionary, Dictionary, ModifyDictionary};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dictionaries", get(retrieve).post(create))
        .route("/dictionaries/subset", get(subset))
        .route("/dictionaries/exists", get(exists))
        .route("/dictionaries/{id}", get(fetch).put(modify).delete(remove))
        .route("/dictionaries/{id}/@enable", post(enable))
}

#[derive(Debug, Deserialize)]
struct SubsetQuery {
    #[serde(default)]
    superior_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExistsQuery {
    name: String,
    #[serde(default)]
    superior_id: Option<String>,
    #[serde(default)]
    exclude_id: Option<String>,
}

async fn retrieve(
    State(svc): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<Dictionary>>, ServiceError> {
    Ok(Json(svc.retrieve_dictionaries(&params)?))
}

async fn create(
    State(svc): State<AppState>,
    Json(input): Json<CreateDictionary>,
) -> Result<(StatusCode, Json<Dictionary>), ServiceError> {
    Ok((StatusCode::CREATED, Json(svc.create_dictionary(input)?)))
}

async fn subset(
    State(svc): State<AppState>,
    Query(query): Query<SubsetQuery>,
) -> Result<Json<Vec<Dictionary>>, ServiceError> {
    Ok(Json(svc.dictionary_subset(query.superior_id.as_deref())?))
}

async fn exists(
    State(svc): State<AppState>,
    Query(query): Query<ExistsQuery>,
) -> Result<Json<Exists>, ServiceError> {
    let exists = svc.dictionary_exists(
        &query.name,
        query.superior_id.as_deref(),
        query.exclude_id.as_deref(),
    )?;
    Ok(Json(Exists { exists }))
}

async fn fetch(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Dictionary>, ServiceError> {
    Ok(Json(svc.fetch_dictionary(&id)?))
}

async fn modify(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ModifyDictionary>,
) -> Result<Json<Dictionary>, ServiceError> {
    Ok(Json(svc.modify_dictionary(&id, patch)?))
}

async fn remove(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.remove_dictionary(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn enable(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Dictionary>, ServiceError> {
    Ok(Json(svc.enable_dictionary(&id)?))
}
