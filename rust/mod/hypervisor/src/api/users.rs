use std::collections::BTreeSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use hypervisor_core::{ListParams, ListResult, ServiceError};

use crate::api::{AppState, Exists};
use crate::model::{CreateUser, ModifyUser, User};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(retrieve).post(create))
        .route("/users/@import", post(create_all))
        .route("/users/exists", get(exists))
        .route("/users/{id}", get(fetch).put(modify).delete(remove))
        .route("/users/{id}/@enable", post(enable))
        .route("/authorities", get(authorities))
        .route("/authorities/check", get(check))
}

#[derive(Debug, Deserialize)]
struct UsernameExists {
    username: String,
    #[serde(default)]
    exclude_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorityQuery {
    username: String,
    #[serde(default)]
    authority: Option<String>,
}

#[derive(Debug, Serialize)]
struct Granted {
    granted: bool,
}

async fn retrieve(
    State(svc): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<User>>, ServiceError> {
    Ok(Json(svc.retrieve_users(&params)?))
}

async fn create(
    State(svc): State<AppState>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<User>), ServiceError> {
    Ok((StatusCode::CREATED, Json(svc.create_user(input)?)))
}

async fn create_all(
    State(svc): State<AppState>,
    Json(inputs): Json<Vec<CreateUser>>,
) -> Result<(StatusCode, Json<Vec<User>>), ServiceError> {
    Ok((StatusCode::CREATED, Json(svc.create_users(inputs)?)))
}

async fn exists(
    State(svc): State<AppState>,
    Query(query): Query<UsernameExists>,
) -> Result<Json<Exists>, ServiceError> {
    let exists = svc.user_exists(&query.username, query.exclude_id.as_deref())?;
    Ok(Json(Exists { exists }))
}

async fn fetch(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ServiceError> {
    Ok(Json(svc.fetch_user(&id)?))
}

async fn modify(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ModifyUser>,
) -> Result<Json<User>, ServiceError> {
    Ok(Json(svc.modify_user(&id, patch)?))
}

async fn remove(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.remove_user(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn enable(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ServiceError> {
    Ok(Json(svc.enable_user(&id)?))
}

async fn authorities(
    State(svc): State<AppState>,
    Query(query): Query<AuthorityQuery>,
) -> Result<Json<BTreeSet<String>>, ServiceError> {
    Ok(Json(svc.authorities(&query.username)?))
}

async fn check(
    State(svc): State<AppState>,
    Query(query): Query<AuthorityQuery>,
) -> Result<Json<Granted>, ServiceError> {
    let authority = query.authority.unwrap_or_default();
    let granted = svc.has_authority(&query.username, &authority)?;
    Ok(Json(Granted { granted }))
}
