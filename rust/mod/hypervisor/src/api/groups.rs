use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use hypervisor_core::{ListParams, ListResult, ServiceError};

use crate::api::{AppState, Exists, NameExists};
use crate::model::{
    ActionQuery, AddMember, CreateGroup, Group, GroupMember, GroupNode, GroupPrivilege, GroupRole,
    ModifyGroup, Role,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/groups", get(retrieve).post(create))
        .route("/groups/tree", get(tree))
        .route("/groups/exists", get(exists))
        .route("/groups/{id}", get(fetch).put(modify).delete(remove))
        .route("/groups/{id}/@enable", post(enable))
        .route("/groups/{id}/members", get(members).post(add_member))
        .route("/groups/{id}/members/{username}", delete(remove_member))
        .route("/groups/{id}/roles", get(roles))
        .route("/groups/{id}/roles/{role_id}", post(add_role).delete(remove_role))
        .route("/groups/{id}/privileges", get(privileges))
        .route(
            "/groups/{id}/privileges/{privilege_id}",
            post(relate_privilege).delete(remove_privilege),
        )
        .route("/groups/{id}/authorities", get(authorities))
        .route("/groups/{id}/authorities/@rebuild", post(rebuild_authorities))
}

async fn retrieve(
    State(svc): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<Group>>, ServiceError> {
    Ok(Json(svc.retrieve_groups(&params)?))
}

async fn create(
    State(svc): State<AppState>,
    Json(input): Json<CreateGroup>,
) -> Result<(StatusCode, Json<Group>), ServiceError> {
    Ok((StatusCode::CREATED, Json(svc.create_group(input)?)))
}

async fn tree(State(svc): State<AppState>) -> Result<Json<Vec<GroupNode>>, ServiceError> {
    Ok(Json(svc.group_tree()?))
}

async fn exists(
    State(svc): State<AppState>,
    Query(query): Query<NameExists>,
) -> Result<Json<Exists>, ServiceError> {
    let exists = svc.group_exists(&query.name, query.exclude_id.as_deref())?;
    Ok(Json(Exists { exists }))
}

async fn fetch(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Group>, ServiceError> {
    Ok(Json(svc.fetch_group(&id)?))
}

async fn modify(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ModifyGroup>,
) -> Result<Json<Group>, ServiceError> {
    Ok(Json(svc.modify_group(&id, patch)?))
}

async fn remove(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.remove_group(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn enable(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Group>, ServiceError> {
    Ok(Json(svc.enable_group(&id)?))
}

async fn members(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<GroupMember>>, ServiceError> {
    Ok(Json(svc.list_group_members(&id)?))
}

async fn add_member(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<AddMember>,
) -> Result<(StatusCode, Json<GroupMember>), ServiceError> {
    let member = svc.add_group_member(&id, &input.username)?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn remove_member(
    State(svc): State<AppState>,
    Path((id, username)): Path<(String, String)>,
) -> Result<StatusCode, ServiceError> {
    svc.remove_group_member(&id, &username)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn roles(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Role>>, ServiceError> {
    Ok(Json(svc.list_group_roles(&id)?))
}

async fn add_role(
    State(svc): State<AppState>,
    Path((id, role_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<GroupRole>), ServiceError> {
    Ok((StatusCode::CREATED, Json(svc.add_group_role(&id, &role_id)?)))
}

async fn remove_role(
    State(svc): State<AppState>,
    Path((id, role_id)): Path<(String, String)>,
) -> Result<StatusCode, ServiceError> {
    svc.remove_group_role(&id, &role_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn privileges(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<GroupPrivilege>>, ServiceError> {
    Ok(Json(svc.group_privileges(&id)?))
}

async fn relate_privilege(
    State(svc): State<AppState>,
    Path((id, privilege_id)): Path<(String, String)>,
    Query(query): Query<ActionQuery>,
) -> Result<Json<GroupPrivilege>, ServiceError> {
    let grant = svc.relate_group_privilege(&id, &privilege_id, query.action.as_deref())?;
    Ok(Json(grant))
}

async fn remove_privilege(
    State(svc): State<AppState>,
    Path((id, privilege_id)): Path<(String, String)>,
    Query(query): Query<ActionQuery>,
) -> Result<StatusCode, ServiceError> {
    svc.remove_group_privilege(&id, &privilege_id, query.action.as_deref())?;
    Ok(StatusCode::NO_CONTENT)
}

async fn authorities(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, ServiceError> {
    Ok(Json(svc.group_authorities(&id)?))
}

async fn rebuild_authorities(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, ServiceError> {
    svc.fetch_group(&id)?;
    Ok(Json(svc.rebuild_group_authorities(&id)?))
}
