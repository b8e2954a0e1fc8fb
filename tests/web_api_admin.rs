//! Web API Administration Tests
//!
//! Integration tests for features, stores, roles, users and invitations,
//! including permission checks and tenant isolation.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{access_token, create_test_app, TestApp, PASSWORD};

/// Invite `email` with a fresh role carrying `grants`, accept, and return
/// the new user's access token and id.
async fn invite_member(
    app: &TestApp,
    admin_token: &str,
    email: &str,
    grants: Value,
    store_ids: Value,
) -> (String, String) {
    let role: Value = app
        .post(
            "/api/v1/roles",
            admin_token,
            json!({ "name": format!("Role for {}", email) }),
        )
        .await
        .json();
    let role_id = role["id"].as_str().unwrap().to_string();

    app.put(
        &format!("/api/v1/roles/{}/permissions", role_id),
        admin_token,
        json!({ "permissions": grants }),
    )
    .await
    .assert_status_ok();

    app.post(
        "/api/v1/invitations",
        admin_token,
        json!({ "email": email, "role_id": role_id, "store_ids": store_ids }),
    )
    .await
    .assert_status(StatusCode::CREATED);

    let token = app.notifier.last_invitation_token(email).unwrap();
    let body: Value = app
        .server
        .post("/api/v1/auth/accept-invitation")
        .json(&json!({
            "token": token,
            "password": PASSWORD,
            "first_name": "Member",
            "last_name": "User"
        }))
        .await
        .json();

    (
        access_token(&body),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

async fn feature_id(app: &TestApp, token: &str, slug: &str) -> String {
    let tree: Value = app.get("/api/v1/features", token).await.json();
    tree.as_array()
        .unwrap()
        .iter()
        .flat_map(|parent| parent["children"].as_array().unwrap().iter())
        .find(|child| child["slug"] == slug)
        .map(|child| child["id"].as_str().unwrap().to_string())
        .unwrap()
}

// ============================================================================
// Feature Tests
// ============================================================================

#[tokio::test]
async fn test_feature_tree() {
    let app = create_test_app().await;
    let token = app.admin_token("Acme", "owner@acme.test").await;

    let response = app.get("/api/v1/features", &token).await;
    response.assert_status_ok();

    let tree: Value = response.json();
    let slugs: Vec<&str> = tree
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap())
        .collect();
    assert_eq!(slugs, ["master-data", "reporting", "purchase", "settings"]);

    let settings = &tree[3];
    assert_eq!(settings["actions"], json!([]));
    assert_eq!(settings["children"].as_array().unwrap().len(), 4);
    assert_eq!(settings["children"][0]["slug"], "settings.store");
}

#[tokio::test]
async fn test_feature_tree_requires_authentication() {
    let app = create_test_app().await;
    app.server
        .get("/api/v1/features")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Store Tests
// ============================================================================

#[tokio::test]
async fn test_store_crud() {
    let app = create_test_app().await;
    let token = app.admin_token("Acme", "owner@acme.test").await;

    let response = app
        .post(
            "/api/v1/stores",
            &token,
            json!({ "name": "Branch", "address": "1 High St" }),
        )
        .await;
    response.assert_status(StatusCode::CREATED);
    let store: Value = response.json();
    assert_eq!(store["address"], "1 High St");
    assert!(store.get("phone").is_none());

    let response = app
        .post("/api/v1/stores", &token, json!({ "name": "Branch" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(
        response.json::<Value>()["error"],
        "a store with this name already exists in your tenant"
    );

    let stores: Value = app.get("/api/v1/stores", &token).await.json();
    let names: Vec<&str> = stores
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Branch", "Main Store"]);

    let id = store["id"].as_str().unwrap();
    let fetched: Value = app
        .get(&format!("/api/v1/stores/{}", id), &token)
        .await
        .json();
    assert_eq!(fetched["name"], "Branch");
}

#[tokio::test]
async fn test_store_update_and_deactivate() {
    let app = create_test_app().await;
    let token = app.admin_token("Acme", "owner@acme.test").await;

    let branch: Value = app
        .post("/api/v1/stores", &token, json!({ "name": "Branch" }))
        .await
        .json();
    let path = format!("/api/v1/stores/{}", branch["id"].as_str().unwrap());

    let response = app
        .put(
            &path,
            &token,
            json!({ "name": "Harbour", "address": "9 Quay Rd", "phone": "555-0199" }),
        )
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["name"], "Harbour");
    assert_eq!(updated["address"], "9 Quay Rd");
    assert_eq!(updated["phone"], "555-0199");
    assert_eq!(updated["is_active"], true);

    let response = app
        .put(&path, &token, json!({ "name": "Main Store" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(
        response.json::<Value>()["error"],
        "a store with this name already exists in your tenant"
    );

    app.put(&path, &token, json!({ "address": "nowhere" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let response = app.delete(&path, &token).await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["message"],
        "store deactivated successfully"
    );
    let fetched: Value = app.get(&path, &token).await.json();
    assert_eq!(fetched["is_active"], false);
    assert_eq!(fetched["name"], "Harbour");
}

#[tokio::test]
async fn test_store_edit_and_delete_need_permissions() {
    let app = create_test_app().await;
    let admin = app.admin_token("Acme", "owner@acme.test").await;
    let store_feature = feature_id(&app, &admin, "settings.store").await;

    let branch: Value = app
        .post("/api/v1/stores", &admin, json!({ "name": "Branch" }))
        .await
        .json();
    let path = format!("/api/v1/stores/{}", branch["id"].as_str().unwrap());

    let (member, _) = invite_member(
        &app,
        &admin,
        "clerk@acme.test",
        json!([{ "feature_id": store_feature, "actions": ["read", "edit"] }]),
        json!([branch["id"]]),
    )
    .await;

    app.put(&path, &member, json!({ "name": "Renamed" }))
        .await
        .assert_status_ok();

    let response = app.delete(&path, &member).await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error"], "insufficient permissions");
}

#[tokio::test]
async fn test_store_validation_and_bad_id() {
    let app = create_test_app().await;
    let token = app.admin_token("Acme", "owner@acme.test").await;

    let response = app.post("/api/v1/stores", &token, json!({})).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.json::<Value>()["details"]["name"].is_string());

    let response = app.get("/api/v1/stores/not-a-uuid", &token).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["error"], "invalid store ID");
}

#[tokio::test]
async fn test_store_scope() {
    let app = create_test_app().await;
    let admin = app.admin_token("Acme", "owner@acme.test").await;
    let store_feature = feature_id(&app, &admin, "settings.store").await;

    let branch: Value = app
        .post("/api/v1/stores", &admin, json!({ "name": "Branch" }))
        .await
        .json();
    let stores: Value = app.get("/api/v1/stores", &admin).await.json();
    let main = stores
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == "Main Store")
        .unwrap()
        .clone();

    let (member, _) = invite_member(
        &app,
        &admin,
        "manager@acme.test",
        json!([{ "feature_id": store_feature, "actions": ["read"] }]),
        json!([branch["id"]]),
    )
    .await;

    let visible: Value = app.get("/api/v1/stores", &member).await.json();
    assert_eq!(visible.as_array().unwrap().len(), 1);
    assert_eq!(visible[0]["id"], branch["id"]);

    let response = app
        .get(
            &format!("/api/v1/stores/{}", main["id"].as_str().unwrap()),
            &member,
        )
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        response.json::<Value>()["error"],
        "you do not have access to this store"
    );

    // read only
    let response = app
        .post("/api/v1/stores", &member, json!({ "name": "Sneaky" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error"], "insufficient permissions");
}

// ============================================================================
// Role Tests
// ============================================================================

#[tokio::test]
async fn test_role_lifecycle() {
    let app = create_test_app().await;
    let token = app.admin_token("Acme", "owner@acme.test").await;
    let product = feature_id(&app, &token, "master-data.product").await;

    let response = app
        .post(
            "/api/v1/roles",
            &token,
            json!({ "name": "Cashier", "description": "Front counter" }),
        )
        .await;
    response.assert_status(StatusCode::CREATED);
    let role: Value = response.json();
    assert_eq!(role["is_system_default"], false);
    let path = format!("/api/v1/roles/{}", role["id"].as_str().unwrap());

    app.post("/api/v1/roles", &token, json!({ "name": "Cashier" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let response = app
        .put(
            &format!("{}/permissions", path),
            &token,
            json!({ "permissions": [{ "feature_id": product, "actions": ["read", "edit"] }] }),
        )
        .await;
    response.assert_status_ok();
    let permissions: Value = response.json();
    assert_eq!(permissions[0]["feature_slug"], "master-data.product");

    let detail: Value = app.get(&path, &token).await.json();
    assert_eq!(detail["name"], "Cashier");
    assert_eq!(detail["permissions"][0]["actions"], json!(["read", "edit"]));

    let updated: Value = app
        .put(&path, &token, json!({ "name": "Senior Cashier" }))
        .await
        .json();
    assert_eq!(updated["name"], "Senior Cashier");

    app.delete(&path, &token).await.assert_status_ok();
    app.get(&path, &token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_role_permission_validation() {
    let app = create_test_app().await;
    let token = app.admin_token("Acme", "owner@acme.test").await;
    let sales = feature_id(&app, &token, "reporting.sales").await;

    let role: Value = app
        .post("/api/v1/roles", &token, json!({ "name": "Analyst" }))
        .await
        .json();
    let path = format!(
        "/api/v1/roles/{}/permissions",
        role["id"].as_str().unwrap()
    );

    let response = app
        .put(
            &path,
            &token,
            json!({ "permissions": [{ "feature_id": sales, "actions": ["delete"] }] }),
        )
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        response.json::<Value>()["error"],
        "invalid action 'delete' for feature reporting.sales"
    );

    let missing = "00000000-0000-0000-0000-000000000000";
    let response = app
        .put(
            &path,
            &token,
            json!({ "permissions": [{ "feature_id": missing, "actions": ["read"] }] }),
        )
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        response.json::<Value>()["error"],
        format!("feature not found: {}", missing)
    );
}

#[tokio::test]
async fn test_system_default_role_protected() {
    let app = create_test_app().await;
    let token = app.admin_token("Acme", "owner@acme.test").await;

    let roles: Value = app.get("/api/v1/roles", &token).await.json();
    assert_eq!(roles[0]["name"], "Administrator");
    assert_eq!(roles[0]["is_system_default"], true);
    let path = format!("/api/v1/roles/{}", roles[0]["id"].as_str().unwrap());

    let response = app.put(&path, &token, json!({ "name": "Boss" })).await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        response.json::<Value>()["error"],
        "cannot rename system default roles"
    );

    let response = app.delete(&path, &token).await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        response.json::<Value>()["error"],
        "cannot delete system default roles"
    );
}

// ============================================================================
// User Tests
// ============================================================================

#[tokio::test]
async fn test_user_management() {
    let app = create_test_app().await;
    let admin = app.admin_token("Acme", "owner@acme.test").await;
    let me: Value = app.get("/api/v1/me", &admin).await.json();
    let admin_id = me["id"].as_str().unwrap().to_string();

    let (member, member_id) =
        invite_member(&app, &admin, "clerk@acme.test", json!([]), json!([])).await;

    let users: Value = app.get("/api/v1/users", &admin).await.json();
    assert_eq!(users.as_array().unwrap().len(), 2);

    let path = format!("/api/v1/users/{}", member_id);
    let updated: Value = app
        .put(&path, &admin, json!({ "first_name": "Casey" }))
        .await
        .json();
    assert_eq!(updated["first_name"], "Casey");
    assert_eq!(updated["last_name"], "User");

    let branch: Value = app
        .post("/api/v1/stores", &admin, json!({ "name": "Branch" }))
        .await
        .json();
    let assigned: Value = app
        .put(
            &format!("{}/stores", path),
            &admin,
            json!({ "store_ids": [branch["id"]] }),
        )
        .await
        .json();
    assert_eq!(assigned[0]["id"], branch["id"]);

    let detail: Value = app.get(&path, &admin).await.json();
    assert_eq!(detail["stores"][0]["name"], "Branch");
    assert_eq!(detail["roles"].as_array().unwrap().len(), 1);

    // members without settings.user cannot list users
    app.get("/api/v1/users", &member)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = app
        .delete(&format!("/api/v1/users/{}", admin_id), &admin)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        response.json::<Value>()["error"],
        "cannot deactivate your own account"
    );

    app.delete(&path, &admin).await.assert_status_ok();
    let detail: Value = app.get(&path, &admin).await.json();
    assert_eq!(detail["is_active"], false);

    let response = app.login("clerk@acme.test", PASSWORD).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"], "account is deactivated");
}

#[tokio::test]
async fn test_user_store_assignment_rejects_foreign_store() {
    let app = create_test_app().await;
    let acme = app.admin_token("Acme", "owner@acme.test").await;
    let globex = app.admin_token("Globex", "owner@globex.test").await;
    let me: Value = app.get("/api/v1/me", &acme).await.json();

    let foreign: Value = app.get("/api/v1/stores", &globex).await.json();
    let foreign_id = foreign[0]["id"].as_str().unwrap();

    let response = app
        .put(
            &format!("/api/v1/users/{}/stores", me["id"].as_str().unwrap()),
            &acme,
            json!({ "store_ids": [foreign_id] }),
        )
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        response.json::<Value>()["error"],
        format!("store not found: {}", foreign_id)
    );
}

// ============================================================================
// Invitation Tests
// ============================================================================

#[tokio::test]
async fn test_invitation_list_and_cancel() {
    let app = create_test_app().await;
    let token = app.admin_token("Acme", "owner@acme.test").await;
    let role: Value = app
        .post("/api/v1/roles", &token, json!({ "name": "Cashier" }))
        .await
        .json();

    let response = app
        .post(
            "/api/v1/invitations",
            &token,
            json!({ "email": "New@Acme.test", "role_id": role["id"] }),
        )
        .await;
    response.assert_status(StatusCode::CREATED);
    let invitation: Value = response.json();
    assert_eq!(invitation["email"], "new@acme.test");
    assert_eq!(invitation["status"], "pending");
    assert!(invitation.get("token_hash").is_none());

    let listed: Value = app.get("/api/v1/invitations", &token).await.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // a pending invitation pins its role
    let role_path = format!("/api/v1/roles/{}", role["id"].as_str().unwrap());
    let response = app.delete(&role_path, &token).await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(
        response.json::<Value>()["error"],
        "cannot delete a role with pending invitations"
    );

    let path = format!(
        "/api/v1/invitations/{}",
        invitation["id"].as_str().unwrap()
    );
    app.delete(&path, &token).await.assert_status_ok();

    let response = app.delete(&path, &token).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        response.json::<Value>()["error"],
        "can only cancel pending invitations"
    );

    let listed: Value = app.get("/api/v1/invitations", &token).await.json();
    assert_eq!(listed[0]["status"], "cancelled");

    app.delete(&role_path, &token).await.assert_status_ok();
    let listed: Value = app.get("/api/v1/invitations", &token).await.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["status"], "cancelled");
    assert!(listed[0]["role_id"].is_null());
}

#[tokio::test]
async fn test_invitation_for_existing_user() {
    let app = create_test_app().await;
    let token = app.admin_token("Acme", "owner@acme.test").await;
    app.register("Globex", "owner@globex.test").await;
    let role: Value = app
        .post("/api/v1/roles", &token, json!({ "name": "Cashier" }))
        .await
        .json();

    let response = app
        .post(
            "/api/v1/invitations",
            &token,
            json!({ "email": "owner@globex.test", "role_id": role["id"] }),
        )
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_invitation_validation() {
    let app = create_test_app().await;
    let token = app.admin_token("Acme", "owner@acme.test").await;

    let response = app
        .post(
            "/api/v1/invitations",
            &token,
            json!({ "email": "not-an-email" }),
        )
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["details"]["email"], "must be a valid email address");
    assert_eq!(body["details"]["role_id"], "this field is required");
}

// ============================================================================
// Tenant Isolation Tests
// ============================================================================

#[tokio::test]
async fn test_other_tenant_rows_are_not_found() {
    let app = create_test_app().await;
    let acme = app.admin_token("Acme", "owner@acme.test").await;
    let globex = app.admin_token("Globex", "owner@globex.test").await;

    let globex_roles: Value = app.get("/api/v1/roles", &globex).await.json();
    let globex_stores: Value = app.get("/api/v1/stores", &globex).await.json();
    let globex_me: Value = app.get("/api/v1/me", &globex).await.json();

    let role_path = format!(
        "/api/v1/roles/{}",
        globex_roles[0]["id"].as_str().unwrap()
    );
    let store_path = format!(
        "/api/v1/stores/{}",
        globex_stores[0]["id"].as_str().unwrap()
    );
    let user_path = format!("/api/v1/users/{}", globex_me["id"].as_str().unwrap());

    for path in [&role_path, &store_path, &user_path] {
        app.get(path, &acme)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
    for path in [&store_path, &user_path] {
        app.delete(path, &acme)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
    app.put(&store_path, &acme, json!({ "name": "Taken Over" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let still: Value = app.get(&store_path, &globex).await.json();
    assert_eq!(still["is_active"], true);
    assert_eq!(still["name"], globex_stores[0]["name"]);

    // listings only show the caller's tenant
    let users: Value = app.get("/api/v1/users", &acme).await.json();
    assert_eq!(users.as_array().unwrap().len(), 1);
    assert_eq!(users[0]["email"], "owner@acme.test");
}
