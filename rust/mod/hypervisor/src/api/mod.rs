mod dictionaries;
mod groups;
mod logs;
mod messages;
mod privileges;
mod roles;
mod users;

use std::sync::Arc;

use axum::Router;
use serde::{Deserialize, Serialize};

use crate::service::AdminService;

/// Shared application state.
pub type AppState = Arc<AdminService>;

/// Query for the `exists` endpoints keyed by name.
#[derive(Debug, Deserialize)]
pub(crate) struct NameExists {
    pub name: String,
    #[serde(default)]
    pub exclude_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Exists {
    pub exists: bool,
}

/// Build the complete hypervisor API router, nested under `/hypervisor`.
pub fn build_router(svc: Arc<AdminService>) -> Router {
    let api = Router::new()
        .merge(privileges::routes())
        .merge(roles::routes())
        .merge(groups::routes())
        .merge(users::routes())
        .merge(dictionaries::routes())
        .merge(messages::routes())
        .merge(logs::routes());

    Router::new().nest("/hypervisor", api).with_state(svc)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::build_router;
    use crate::service::test_support::test_service;

    async fn api(router: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let body = match body {
            Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
            None => Body::empty(),
        };
        let req = builder.body(body).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let json = if bytes.is_empty() {
            json!(null)
        } else {
            serde_json::from_slice(&bytes).unwrap_or(json!(null))
        };
        (status, json)
    }

    async fn create(router: &axum::Router, uri: &str, body: Value) -> String {
        let (status, json) = api(router, "POST", uri, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "POST {} -> {}", uri, json);
        json["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn resolved_tree_over_http() {
        let router = build_router(test_service());

        let p0 = create(&router, "/hypervisor/privileges", json!({"name": "system", "path": "/system"})).await;
        let p1 = create(
            &router,
            "/hypervisor/privileges",
            json!({"name": "user", "path": "/user", "superior_id": p0}),
        )
        .await;
        let g1 = create(&router, "/hypervisor/groups", json!({"name": "G1"})).await;
        let r1 = create(&router, "/hypervisor/roles", json!({"name": "R1"})).await;
        create(&router, "/hypervisor/users", json!({"username": "alice"})).await;

        let (s, _) = api(&router, "POST", &format!("/hypervisor/groups/{}/members", g1), Some(json!({"username": "alice"}))).await;
        assert_eq!(s, StatusCode::CREATED);
        let (s, _) = api(&router, "POST", &format!("/hypervisor/groups/{}/roles/{}", g1, r1), None).await;
        assert_eq!(s, StatusCode::CREATED);

        let (s, grant) = api(
            &router,
            "POST",
            &format!("/hypervisor/roles/{}/privileges/{}?action=view", r1, p1),
            None,
        )
        .await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(grant["actions"], json!(["view"]));
        let (s, _) = api(
            &router,
            "POST",
            &format!("/hypervisor/groups/{}/privileges/{}?action=edit", g1, p1),
            None,
        )
        .await;
        assert_eq!(s, StatusCode::OK);

        let (s, tree) = api(&router, "GET", "/hypervisor/privileges/tree?username=alice", None).await;
        assert_eq!(s, StatusCode::OK);
        let roots = tree.as_array().unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0]["id"], json!(p0));
        assert_eq!(roots[0]["meta"]["actions"], json!([]));
        assert_eq!(roots[0]["children"][0]["id"], json!(p1));
        assert_eq!(roots[0]["children"][0]["meta"]["actions"], json!(["edit", "view"]));

        let (_, check) = api(&router, "GET", "/hypervisor/authorities/check?username=alice&authority=user:edit", None).await;
        assert_eq!(check["granted"], json!(true));
    }

    #[tokio::test]
    async fn withdraw_action_over_http() {
        let router = build_router(test_service());
        let p = create(&router, "/hypervisor/privileges", json!({"name": "role"})).await;
        let g = create(&router, "/hypervisor/groups", json!({"name": "ops"})).await;

        api(&router, "POST", &format!("/hypervisor/groups/{}/privileges/{}?action=modify", g, p), None).await;
        let (s, _) = api(
            &router,
            "DELETE",
            &format!("/hypervisor/groups/{}/privileges/{}?action=modify", g, p),
            None,
        )
        .await;
        assert_eq!(s, StatusCode::NO_CONTENT);

        let (_, authorities) = api(&router, "GET", &format!("/hypervisor/groups/{}/authorities", g), None).await;
        assert_eq!(authorities, json!(["role"]));

        api(&router, "DELETE", &format!("/hypervisor/groups/{}/privileges/{}", g, p), None).await;
        let (_, rebuilt) = api(&router, "POST", &format!("/hypervisor/groups/{}/authorities/@rebuild", g), None).await;
        assert_eq!(rebuilt, json!([]));
    }

    #[tokio::test]
    async fn error_format() {
        let router = build_router(test_service());

        let (s, err) = api(&router, "GET", "/hypervisor/privileges/nonexistent", None).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], json!("NOT_FOUND"));
        assert!(err["message"].is_string());

        create(&router, "/hypervisor/roles", json!({"name": "admin"})).await;
        let (s, err) = api(&router, "POST", "/hypervisor/roles", Some(json!({"name": "admin"}))).await;
        assert_eq!(s, StatusCode::CONFLICT);
        assert_eq!(err["code"], json!("ALREADY_EXISTS"));

        let (s, err) = api(&router, "POST", "/hypervisor/groups", Some(json!({"name": "  "}))).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], json!("VALIDATION_FAILED"));
    }

    #[tokio::test]
    async fn list_and_exists() {
        let router = build_router(test_service());
        for name in ["b", "a", "c"] {
            create(&router, "/hypervisor/privileges", json!({"name": name})).await;
        }

        let (s, page) = api(&router, "GET", "/hypervisor/privileges?page=0&size=2&sortBy=name", None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(page["total"], json!(3));
        assert_eq!(page["items"][0]["name"], json!("a"));
        assert_eq!(page["items"].as_array().unwrap().len(), 2);

        let (_, hit) = api(&router, "GET", "/hypervisor/privileges/exists?name=a", None).await;
        assert_eq!(hit["exists"], json!(true));
        let (_, miss) = api(&router, "GET", "/hypervisor/privileges/exists?name=z", None).await;
        assert_eq!(miss["exists"], json!(false));
    }

    #[tokio::test]
    async fn messages_and_logs() {
        let router = build_router(test_service());
        let id = create(
            &router,
            "/hypervisor/messages",
            json!({"title": "hello", "content": "hi", "receiver": "alice"}),
        )
        .await;

        let (_, unread) = api(&router, "GET", "/hypervisor/messages/unread?receiver=alice", None).await;
        assert_eq!(unread["unread"], json!(1));
        let (_, message) = api(&router, "GET", &format!("/hypervisor/messages/{}", id), None).await;
        assert_eq!(message["unread"], json!(false));

        create(&router, "/hypervisor/logs", json!({"kind": "audit", "operation": "login"})).await;
        create(&router, "/hypervisor/logs", json!({"kind": "access", "operation": "GET /"})).await;
        let (_, audit) = api(&router, "GET", "/hypervisor/logs?kind=audit", None).await;
        assert_eq!(audit["total"], json!(1));
        let (_, cleared) = api(&router, "DELETE", "/hypervisor/logs?kind=access", None).await;
        assert_eq!(cleared["removed"], json!(1));
    }
}
