use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use hypervisor_core::{ListParams, ListResult, ServiceError};

use crate::api::{AppState, Exists, NameExists};
use crate::model::{ActionQuery, AddMember, CreateRole, ModifyRole, Role, RoleMember, RolePrivilege};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(retrieve).post(create))
        .route("/roles/exists", get(exists))
        .route("/roles/{id}", get(fetch).put(modify).delete(remove))
        .route("/roles/{id}/@enable", post(enable))
        .route("/roles/{id}/privileges", get(privileges))
        .route(
            "/roles/{id}/privileges/{privilege_id}",
            post(relate_privilege).delete(remove_privilege),
        )
        .route("/roles/{id}/members", get(members).post(add_member))
        .route("/roles/{id}/members/{username}", delete(remove_member))
}

async fn retrieve(
    State(svc): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<Role>>, ServiceError> {
    Ok(Json(svc.retrieve_roles(&params)?))
}

async fn create(
    State(svc): State<AppState>,
    Json(input): Json<CreateRole>,
) -> Result<(StatusCode, Json<Role>), ServiceError> {
    Ok((StatusCode::CREATED, Json(svc.create_role(input)?)))
}

async fn exists(
    State(svc): State<AppState>,
    Query(query): Query<NameExists>,
) -> Result<Json<Exists>, ServiceError> {
    let exists = svc.role_exists(&query.name, query.exclude_id.as_deref())?;
    Ok(Json(Exists { exists }))
}

async fn fetch(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Role>, ServiceError> {
    Ok(Json(svc.fetch_role(&id)?))
}

async fn modify(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ModifyRole>,
) -> Result<Json<Role>, ServiceError> {
    Ok(Json(svc.modify_role(&id, patch)?))
}

async fn remove(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.remove_role(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn enable(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Role>, ServiceError> {
    Ok(Json(svc.enable_role(&id)?))
}

async fn privileges(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RolePrivilege>>, ServiceError> {
    Ok(Json(svc.role_privileges(&id)?))
}

async fn relate_privilege(
    State(svc): State<AppState>,
    Path((id, privilege_id)): Path<(String, String)>,
    Query(query): Query<ActionQuery>,
) -> Result<Json<RolePrivilege>, ServiceError> {
    let grant = svc.relate_role_privilege(&id, &privilege_id, query.action.as_deref())?;
    Ok(Json(grant))
}

async fn remove_privilege(
    State(svc): State<AppState>,
    Path((id, privilege_id)): Path<(String, String)>,
    Query(query): Query<ActionQuery>,
) -> Result<StatusCode, ServiceError> {
    svc.remove_role_privilege(&id, &privilege_id, query.action.as_deref())?;
    Ok(StatusCode::NO_CONTENT)
}

async fn members(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RoleMember>>, ServiceError> {
    Ok(Json(svc.list_role_members(&id)?))
}

async fn add_member(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<AddMember>,
) -> Result<(StatusCode, Json<RoleMember>), ServiceError> {
    let member = svc.add_role_member(&id, &input.username)?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn remove_member(
    State(svc): State<AppState>,
    Path((id, username)): Path<(String, String)>,
) -> Result<StatusCode, ServiceError> {
    svc.remove_role_member(&id, &username)?;
    Ok(StatusCode::NO_CONTENT)
}
