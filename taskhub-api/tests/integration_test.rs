/// End-to-end API tests against PostgreSQL
///
/// Run with `DATABASE_URL` pointing at a disposable database:
///
/// ```bash
/// cargo test -p taskhub-api --test integration_test -- --ignored
/// ```

mod common;

use axum::http::{HeaderMap, StatusCode};
use common::{send, token, TestContext, TEST_PASSWORD};
use serde_json::{json, Value};
use taskhub_shared::auth::jwt::TokenType;
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_health_reports_database() {
    let ctx = TestContext::new().await.unwrap();

    let (status, _, body) = send(&ctx.app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["revocation_backend"], "memory");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_register_login_logout_flow() {
    let ctx = TestContext::new().await.unwrap();
    let email = format!("flow-{}@example.com", Uuid::new_v4());

    let (status, _, body) = send(
        &ctx.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "email": email, "username": "flow", "password": TEST_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["user"].get("password_hash").is_none());

    let (status, _, _) = send(
        &ctx.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "email": email, "username": "again", "password": TEST_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, body) = send(
        &ctx.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": "wrong password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let wrong_password_message = body["message"].clone();

    let (_, _, body) = send(
        &ctx.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "wrong password" })),
    )
    .await;
    assert_eq!(body["message"], wrong_password_message);

    let (status, _, body) = send(
        &ctx.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": TEST_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access_token"].as_str().unwrap().to_string();
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let (status, _, body) = send(&ctx.app, "GET", "/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], email.as_str());

    let (status, _, _) = send(
        &ctx.app,
        "POST",
        "/auth/logout",
        Some(&access),
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(&ctx.app, "GET", "/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_revoked");

    let (status, _, body) = send(
        &ctx.app,
        "POST",
        "/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_revoked");

    sqlx::query("DELETE FROM users WHERE email = $1")
        .bind(&email)
        .execute(&ctx.db)
        .await
        .unwrap();
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_project_visibility_by_role() {
    let ctx = TestContext::new().await.unwrap();
    let uri = format!("/projects/{}", ctx.project.id);

    let (status, body) = ctx.send("GET", &uri, &ctx.owner, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "owner");

    let (status, body) = ctx.send("GET", &uri, &ctx.member, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "member");

    // Outsiders and missing projects are indistinguishable
    let (status, _) = ctx.send("GET", &uri, &ctx.outsider, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = ctx.send("GET", "/projects/999999999", &ctx.owner, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // System administrators get no implicit project access
    let (status, _) = ctx.send("GET", &uri, &ctx.sysadmin, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx.send("GET", "/projects", &ctx.member, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["id"] == ctx.project.id));

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_project_admin_and_owner_operations() {
    let ctx = TestContext::new().await.unwrap();
    let uri = format!("/projects/{}", ctx.project.id);
    let rename = Some(json!({ "name": "Renamed" }));

    let (status, _) = ctx.send("PATCH", &uri, &ctx.member, rename.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx.send("PATCH", &uri, &ctx.admin, rename).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["role"], "admin");

    let (status, _) = ctx.send("DELETE", &uri, &ctx.admin, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .send("GET", &format!("{}/stats", uri), &ctx.member, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["member_count"], 3);

    let (status, _) = ctx.send("DELETE", &uri, &ctx.owner, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx.send("GET", &uri, &ctx.owner, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_member_management() {
    let ctx = TestContext::new().await.unwrap();
    let members_uri = format!("/projects/{}/members", ctx.project.id);

    let (status, body) = ctx.send("GET", &members_uri, &ctx.member, None).await;
    assert_eq!(status, StatusCode::OK);
    let listing = body.as_array().unwrap();
    assert_eq!(listing.len(), 3);
    assert_eq!(listing[0]["user_id"], ctx.owner.id());
    assert_eq!(listing[0]["is_owner"], true);

    let add_outsider = Some(json!({ "email": ctx.outsider.user.email }));

    let (status, _) = ctx
        .send("POST", &members_uri, &ctx.member, add_outsider.clone())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .send("POST", &members_uri, &ctx.admin, add_outsider.clone())
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "member");

    let (status, _) = ctx.send("POST", &members_uri, &ctx.admin, add_outsider).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = ctx
        .send(
            "POST",
            &members_uri,
            &ctx.admin,
            Some(json!({ "email": ctx.owner.user.email })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = ctx
        .send(
            "POST",
            &members_uri,
            &ctx.admin,
            Some(json!({ "email": format!("ghost-{}@example.com", Uuid::new_v4()) })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let owner_uri = format!("{}/{}", members_uri, ctx.owner.id());
    let (status, _) = ctx.send("DELETE", &owner_uri, &ctx.admin, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = ctx
        .send("PATCH", &owner_uri, &ctx.admin, Some(json!({ "role": "member" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let outsider_uri = format!("{}/{}", members_uri, ctx.outsider.id());
    let (status, body) = ctx
        .send("PATCH", &outsider_uri, &ctx.owner, Some(json!({ "role": "admin" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");

    let (status, _) = ctx.send("DELETE", &outsider_uri, &ctx.owner, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Removal takes effect on the next request
    let project_uri = format!("/projects/{}", ctx.project.id);
    let (status, _) = ctx.send("GET", &project_uri, &ctx.outsider, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.send("DELETE", &outsider_uri, &ctx.owner, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_task_modify_permissions() {
    let ctx = TestContext::new().await.unwrap();
    let tasks_uri = format!("/projects/{}/tasks", ctx.project.id);

    let (status, body) = ctx
        .send(
            "POST",
            &tasks_uri,
            &ctx.owner,
            Some(json!({ "title": "  Write release notes ", "priority": "high" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Write release notes");
    assert_eq!(body["created_by"], ctx.owner.id());
    let task_uri = format!("/tasks/{}", body["id"]);

    // Any project role can read
    let (status, _) = ctx.send("GET", &task_uri, &ctx.member, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ctx.send("GET", &task_uri, &ctx.outsider, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Plain member is neither creator nor assignee
    let progress = Some(json!({ "progress": 50 }));
    let (status, _) = ctx.send("PATCH", &task_uri, &ctx.member, progress.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .send(
            "PATCH",
            &task_uri,
            &ctx.admin,
            Some(json!({ "assigned_to": ctx.member.id() })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx.send("PATCH", &task_uri, &ctx.member, progress).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"], 50);

    let (status, _) = ctx
        .send("PATCH", &task_uri, &ctx.member, Some(json!({ "progress": 101 })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = ctx.send("DELETE", &task_uri, &ctx.outsider, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.send("DELETE", &task_uri, &ctx.member, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Missing task looks like no access
    let (status, _) = ctx.send("GET", &task_uri, &ctx.owner, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_task_assignee_must_belong_to_project() {
    let ctx = TestContext::new().await.unwrap();
    let tasks_uri = format!("/projects/{}/tasks", ctx.project.id);

    let (status, body) = ctx
        .send(
            "POST",
            &tasks_uri,
            &ctx.member,
            Some(json!({ "title": "Audit", "assigned_to": ctx.outsider.id() })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "assigned_to");

    let (status, _) = ctx
        .send(
            "POST",
            &tasks_uri,
            &ctx.member,
            Some(json!({ "title": "Audit", "assigned_to": ctx.owner.id() })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = ctx
        .send(
            "GET",
            &format!("{}?assigned_to={}", tasks_uri, ctx.owner.id()),
            &ctx.member,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_admin_lifts_revocation() {
    let ctx = TestContext::new().await.unwrap();
    let (claims, access) = token(ctx.member.id(), TokenType::Access);

    ctx.state.revocations.revoke_claims(&claims).await;
    let (status, _, _) = send(&ctx.app, "GET", "/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let uri = format!("/admin/revocations/{}", claims.jti);

    let (status, _) = ctx.send("DELETE", &uri, &ctx.owner, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx.send("DELETE", &uri, &ctx.sysadmin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], true);

    let (status, _, _) = send(&ctx.app, "GET", "/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_liveness_and_readiness() {
    let ctx = TestContext::new().await.unwrap();

    let (status, _, body) = send(&ctx.app, "GET", "/health/live", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");

    let (status, _, body) = send(&ctx.app, "GET", "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    ctx.cleanup().await.unwrap();
}

async fn login(ctx: &TestContext, email: &str, password: &str) -> (StatusCode, HeaderMap, Value) {
    send(
        &ctx.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_login_lockout_after_repeated_failures() {
    let ctx = TestContext::new().await.unwrap();
    let email = ctx.member.user.email.clone();

    for _ in 0..5 {
        let (status, _, _) = login(&ctx, &email, "wrong password").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // Locked before the password is even checked
    let (status, headers, body) = login(&ctx, &email, TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "account_locked");
    let retry_after: u64 = headers["retry-after"].to_str().unwrap().parse().unwrap();
    assert!(retry_after > 14 * 60 && retry_after <= 15 * 60);

    // Other accounts are unaffected
    let (status, _, _) = login(&ctx, &ctx.owner.user.email, TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_successful_login_resets_failure_count() {
    let ctx = TestContext::new().await.unwrap();
    let email = ctx.admin.user.email.clone();

    for _ in 0..4 {
        login(&ctx, &email, "wrong password").await;
    }
    let (status, _, _) = login(&ctx, &email, TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..4 {
        login(&ctx, &email, "wrong password").await;
    }
    let (status, _, _) = login(&ctx, &email, TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_blank_task_title_rejected() {
    let ctx = TestContext::new().await.unwrap();
    let tasks_uri = format!("/projects/{}/tasks", ctx.project.id);

    let (status, body) = ctx
        .send("POST", &tasks_uri, &ctx.owner, Some(json!({ "title": "   " })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "title");

    let task_id = ctx.create_task(&ctx.owner, json!({ "title": "Plan" })).await;
    let (status, _) = ctx
        .send(
            "PATCH",
            &format!("/tasks/{}", task_id),
            &ctx.owner,
            Some(json!({ "title": "\t " })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_task_comments() {
    let ctx = TestContext::new().await.unwrap();
    let task_id = ctx.create_task(&ctx.owner, json!({ "title": "Review" })).await;
    let other_task = ctx.create_task(&ctx.owner, json!({ "title": "Other" })).await;
    let comments_uri = format!("/tasks/{}/comments", task_id);

    let (status, body) = ctx
        .send("POST", &comments_uri, &ctx.member, Some(json!({ "content": " Looks good " })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["content"], "Looks good");
    let comment_id = body["id"].as_i64().unwrap();
    let comment_uri = format!("/comments/{}", comment_id);

    let (status, _) = ctx
        .send(
            "POST",
            &comments_uri,
            &ctx.outsider,
            Some(json!({ "content": "Let me in" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Replies must stay on the same task
    let (status, body) = ctx
        .send(
            "POST",
            &format!("/tasks/{}/comments", other_task),
            &ctx.admin,
            Some(json!({ "content": "Wrong thread", "parent_id": comment_id })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "parent_id");

    let (status, _) = ctx
        .send(
            "POST",
            &comments_uri,
            &ctx.admin,
            Some(json!({ "content": "Agreed", "parent_id": comment_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = ctx.send("GET", &comments_uri, &ctx.owner, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["comments"].as_array().unwrap().len(), 2);
    assert_eq!(body["comments"][0]["username"], "member");
    assert_eq!(body["comments"][1]["parent_id"], comment_id);

    let (status, _) = ctx.send("GET", &comments_uri, &ctx.outsider, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Only the author edits
    let edit = Some(json!({ "content": "Looks great" }));
    let (status, _) = ctx.send("PATCH", &comment_uri, &ctx.admin, edit.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = ctx.send("PATCH", &comment_uri, &ctx.member, edit).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_edited"], true);

    // Outsiders cannot tell whether it exists; admins moderate
    let (status, _) = ctx.send("DELETE", &comment_uri, &ctx.outsider, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = ctx.send("DELETE", &comment_uri, &ctx.admin, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = ctx.send("GET", &comments_uri, &ctx.owner, None).await;
    assert!(body["comments"].as_array().unwrap().is_empty());

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_project_tags() {
    let ctx = TestContext::new().await.unwrap();
    let tags_uri = format!("/projects/{}/tags", ctx.project.id);
    let task_id = ctx.create_task(&ctx.owner, json!({ "title": "Fix crash" })).await;
    let task_tags_uri = format!("/tasks/{}/tags", task_id);

    let (status, body) = ctx
        .send("POST", &tags_uri, &ctx.member, Some(json!({ "name": "bug", "color": "#ef4444" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let tag_id = body["id"].as_i64().unwrap();
    let tag_uri = format!("/tags/{}", tag_id);

    let (status, _) = ctx
        .send("POST", &tags_uri, &ctx.admin, Some(json!({ "name": " bug " })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = ctx
        .send("POST", &tags_uri, &ctx.admin, Some(json!({ "name": "ui", "color": "red" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = ctx.send("GET", &tags_uri, &ctx.outsider, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Renaming and deleting need owner or admin
    let rename = Some(json!({ "name": "defect" }));
    let (status, _) = ctx.send("PATCH", &tag_uri, &ctx.member, rename.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = ctx.send("PATCH", &tag_uri, &ctx.admin, rename).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "defect");

    // Tagging follows task edit rights
    let attach = Some(json!({ "tag_ids": [tag_id, 999_999_999] }));
    let (status, _) = ctx.send("POST", &task_tags_uri, &ctx.member, attach.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = ctx.send("POST", &task_tags_uri, &ctx.owner, attach).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["added"], json!([tag_id]));
    assert_eq!(body["tags"][0]["name"], "defect");

    let (_, body) = ctx.send("GET", &tags_uri, &ctx.member, None).await;
    assert_eq!(body["tags"][0]["task_count"], 1);
    assert_eq!(body["palette"].as_array().unwrap().len(), 10);

    let (status, body) = ctx.send("GET", &task_tags_uri, &ctx.member, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let detach_uri = format!("{}/{}", task_tags_uri, tag_id);
    let (status, _) = ctx.send("DELETE", &detach_uri, &ctx.owner, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = ctx.send("DELETE", &detach_uri, &ctx.owner, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx.send("DELETE", &tag_uri, &ctx.member, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = ctx.send("DELETE", &tag_uri, &ctx.owner, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_cross_project_task_listings() {
    let ctx = TestContext::new().await.unwrap();
    ctx.create_task(
        &ctx.owner,
        json!({ "title": "Assigned", "assigned_to": ctx.member.id() }),
    )
    .await;
    ctx.create_task(&ctx.owner, json!({ "title": "Unassigned" })).await;

    let (status, body) = ctx.send("GET", "/tasks/my", &ctx.member, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["title"], "Assigned");

    let (_, body) = ctx.send("GET", "/tasks/all", &ctx.member, None).await;
    assert_eq!(body["total"], 2);

    let (_, body) = ctx.send("GET", "/tasks/all", &ctx.outsider, None).await;
    assert_eq!(body["total"], 0);

    ctx.cleanup().await.unwrap();
}
