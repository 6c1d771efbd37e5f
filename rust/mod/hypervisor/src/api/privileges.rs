use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use hypervisor_core::{ListParams, ListResult, ServiceError};

use crate::api::{AppState, Exists, NameExists};
use crate::model::{CreatePrivilege, ModifyPrivilege, Privilege, PrivilegeNode};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/privileges", get(retrieve).post(create))
        .route("/privileges/@import", post(create_all))
        .route("/privileges/tree", get(tree))
        .route("/privileges/subset", get(subset))
        .route("/privileges/exists", get(exists))
        .route("/privileges/{id}", get(fetch).put(modify).delete(remove))
        .route("/privileges/{id}/@enable", post(enable))
}

#[derive(Debug, Deserialize)]
struct TreeQuery {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubsetQuery {
    #[serde(default)]
    superior_id: Option<String>,
}

/// With `username`, the user's resolved tree; without, every privilege.
async fn tree(
    State(svc): State<AppState>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<Vec<PrivilegeNode>>, ServiceError> {
    let forest = match query.username {
        Some(username) => svc.privilege_tree_of(&username)?,
        None => svc.privilege_tree()?,
    };
    Ok(Json(forest))
}

async fn retrieve(
    State(svc): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<Privilege>>, ServiceError> {
    Ok(Json(svc.retrieve_privileges(&params)?))
}

async fn create(
    State(svc): State<AppState>,
    Json(input): Json<CreatePrivilege>,
) -> Result<(StatusCode, Json<Privilege>), ServiceError> {
    Ok((StatusCode::CREATED, Json(svc.create_privilege(input)?)))
}

async fn create_all(
    State(svc): State<AppState>,
    Json(inputs): Json<Vec<CreatePrivilege>>,
) -> Result<(StatusCode, Json<Vec<Privilege>>), ServiceError> {
    Ok((StatusCode::CREATED, Json(svc.create_privileges(inputs)?)))
}

async fn subset(
    State(svc): State<AppState>,
    Query(query): Query<SubsetQuery>,
) -> Result<Json<Vec<Privilege>>, ServiceError> {
    Ok(Json(svc.privilege_subset(query.superior_id.as_deref())?))
}

async fn exists(
    State(svc): State<AppState>,
    Query(query): Query<NameExists>,
) -> Result<Json<Exists>, ServiceError> {
    let exists = svc.privilege_exists(&query.name, query.exclude_id.as_deref())?;
    Ok(Json(Exists { exists }))
}

async fn fetch(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Privilege>, ServiceError> {
    Ok(Json(svc.fetch_privilege(&id)?))
}

async fn modify(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ModifyPrivilege>,
) -> Result<Json<Privilege>, ServiceError> {
    Ok(Json(svc.modify_privilege(&id, patch)?))
}

async fn remove(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.remove_privilege(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn enable(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Privilege>, ServiceError> {
    Ok(Json(svc.enable_privilege(&id)?))
}
