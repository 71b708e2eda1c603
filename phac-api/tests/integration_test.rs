/// Integration tests for the PHAC API
///
/// These need a PostgreSQL database in `DATABASE_URL`; migrations run on
/// connect. Run with:
///
/// ```bash
/// DATABASE_URL=postgresql://localhost/phac_test cargo test -p phac-api -- --ignored
/// ```

mod common;

use axum::http::StatusCode;
use common::{body_json, json_post, TestContext, TEST_PASSWORD};
use phac_shared::credits::CreditLedger;
use phac_shared::models::{
    license_key::LicenseKey,
    profile::{PlanStatus, Profile},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

async fn create_key(ctx: &TestContext, name: &str) -> Value {
    let response = ctx
        .send("POST", "/v1/license-keys", Some(json!({ "key_name": name })))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn balance(ctx: &TestContext) -> i32 {
    CreditLedger::new(ctx.db.clone())
        .balance(ctx.user.id)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_register_grants_welcome_credits() {
    let ctx = TestContext::new().await.unwrap();
    let email = format!("new-{}@example.com", Uuid::new_v4());

    let response = ctx
        .app
        .clone()
        .oneshot(json_post(
            "/v1/auth/register",
            &json!({
                "name": "Jane Doe",
                "company_name": "Doe Scripts",
                "email": email,
                "age": 27,
                "password": TEST_PASSWORD,
                "confirm_password": TEST_PASSWORD
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["access_token"].is_string());
    assert_eq!(body["profile"]["credits_balance"], 10);
    assert_eq!(body["profile"]["plan_status"], "trial");

    let user_id: Uuid = body["user_id"].as_str().unwrap().parse().unwrap();

    // Same email again
    let response = ctx
        .app
        .clone()
        .oneshot(json_post(
            "/v1/auth/register",
            &json!({
                "name": "Jane Again",
                "company_name": "Doe Scripts",
                "email": email,
                "age": 27,
                "password": TEST_PASSWORD,
                "confirm_password": TEST_PASSWORD
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    phac_shared::models::user::User::delete(&ctx.db, user_id)
        .await
        .unwrap();
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_login_rejects_wrong_password() {
    let ctx = TestContext::new().await.unwrap();

    let response = ctx
        .app
        .clone()
        .oneshot(json_post(
            "/v1/auth/login",
            &json!({ "email": ctx.user.email, "password": "WrongP@ss999" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ctx
        .app
        .clone()
        .oneshot(json_post(
            "/v1/auth/login",
            &json!({ "email": ctx.user.email, "password": TEST_PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_name_change_allowed_once() {
    let ctx = TestContext::new().await.unwrap();

    let response = ctx
        .send("PUT", "/v1/profile", Some(json!({ "name": "Renamed" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Renamed");

    let response = ctx
        .send("PUT", "/v1/profile", Some(json!({ "name": "Again" })))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_trial_plan_allows_one_active_key() {
    let ctx = TestContext::new().await.unwrap();

    let key = create_key(&ctx, "First").await;
    assert!(key["public_key"].as_str().unwrap().starts_with("phac_"));

    let response = ctx
        .send("POST", "/v1/license-keys", Some(json!({ "key_name": "Second" })))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Revoking frees the slot
    let revoke_uri = format!("/v1/license-keys/{}/revoke", key["id"].as_str().unwrap());
    let response = ctx.send("POST", &revoke_uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "revoked");

    create_key(&ctx, "Second").await;

    // Pro removes the limit
    Profile::set_plan(&ctx.db, ctx.user.id, PlanStatus::Pro)
        .await
        .unwrap();
    create_key(&ctx, "Third").await;

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_protect_workflow_charges_and_links() {
    let ctx = TestContext::new().await.unwrap();
    let key = create_key(&ctx, "Server").await;
    let key_id = key["id"].as_str().unwrap().to_string();

    let response = ctx
        .send(
            "POST",
            "/v1/scripts/protect",
            Some(json!({
                "files": [
                    { "name": "server.lua", "content": "local function payout(amount)\n  return amount\nend" },
                    { "name": "client.lua", "content": "print('hi')" }
                ],
                "protection_level": "advanced",
                "license_key_id": key_id
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["credits_charged"], 6);
    assert_eq!(body["credits_remaining"], 4);
    assert_eq!(body["script_ids"].as_array().unwrap().len(), 2);
    assert_eq!(body["stats"]["lua"], 2);
    assert_eq!(balance(&ctx).await, 4);

    let key = LicenseKey::find_for_user(&ctx.db, key_id.parse().unwrap(), ctx.user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(key.linked_scripts.len(), 2);

    let response = ctx.send("GET", "/v1/license-keys", None).await;
    let body = body_json(response).await;
    assert_eq!(body["keys"][0]["scripts"].as_array().unwrap().len(), 2);

    let response = ctx
        .send("GET", "/v1/activity?event_type=encryption", None)
        .await;
    let body = body_json(response).await;
    assert_eq!(
        body["activity"][0]["description"],
        "2 file(s) protected with level advanced"
    );

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_protect_rejects_non_lua_and_insufficient_credits() {
    let ctx = TestContext::new().await.unwrap();
    let key = create_key(&ctx, "Server").await;
    let key_id = key["id"].as_str().unwrap().to_string();

    let response = ctx
        .send(
            "POST",
            "/v1/scripts/protect",
            Some(json!({
                "files": [{ "name": "ui.js", "content": "var a = 1;" }],
                "protection_level": "standard",
                "license_key_id": key_id
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["message"],
        "Only .lua files are supported"
    );

    // 3 files at premium = 15 credits, balance is 10
    let response = ctx
        .send(
            "POST",
            "/v1/scripts/protect",
            Some(json!({
                "files": [
                    { "name": "a.lua", "content": "print(1)" },
                    { "name": "b.lua", "content": "print(2)" },
                    { "name": "c.lua", "content": "print(3)" }
                ],
                "protection_level": "premium",
                "license_key_id": key_id
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(balance(&ctx).await, 10);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_protect_with_revoked_key_conflicts() {
    let ctx = TestContext::new().await.unwrap();
    let key = create_key(&ctx, "Old").await;
    let key_id = key["id"].as_str().unwrap().to_string();

    ctx.send("POST", &format!("/v1/license-keys/{}/revoke", key_id), None)
        .await;

    let response = ctx
        .send(
            "POST",
            "/v1/scripts/protect",
            Some(json!({
                "files": [{ "name": "a.lua", "content": "print(1)" }],
                "protection_level": "standard",
                "license_key_id": key_id
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = ctx
        .send(
            "POST",
            "/v1/scripts/protect",
            Some(json!({
                "files": [{ "name": "a.lua", "content": "print(1)" }],
                "protection_level": "standard",
                "license_key_id": Uuid::new_v4()
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_analysis_charges_two_credits() {
    let ctx = TestContext::new().await.unwrap();

    let response = ctx
        .send(
            "POST",
            "/v1/analysis",
            Some(json!({
                "file_name": "server.lua",
                "content": "os.execute('rm -rf /')"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["risk_level"], "high");
    assert_eq!(body["credits_remaining"], 8);

    let response = ctx.send("GET", "/v1/billing", None).await;
    let body = body_json(response).await;
    assert_eq!(body["credits_balance"], 8);
    assert_eq!(body["transactions"][0]["kind"], "debit");
    assert_eq!(body["transactions"][0]["amount"], -2);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_delete_key_keeps_scripts() {
    let ctx = TestContext::new().await.unwrap();
    let key = create_key(&ctx, "Temp").await;
    let key_id = key["id"].as_str().unwrap().to_string();

    ctx.send(
        "POST",
        "/v1/scripts/protect",
        Some(json!({
            "files": [{ "name": "a.lua", "content": "print(1)" }],
            "protection_level": "standard",
            "license_key_id": key_id
        })),
    )
    .await;

    let response = ctx
        .send("DELETE", &format!("/v1/license-keys/{}", key_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = ctx
        .send("DELETE", &format!("/v1/license-keys/{}", key_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = ctx.send("GET", "/v1/scripts", None).await;
    let body = body_json(response).await;
    assert_eq!(body["scripts"].as_array().unwrap().len(), 1);
    assert!(body["scripts"][0]["license_key_id"].is_null());

    let response = ctx.send("GET", "/v1/dashboard", None).await;
    let body = body_json(response).await;
    assert_eq!(body["scripts_protected"], 1);
    assert_eq!(body["recent_activity"][0]["event_type"], "key_deleted");

    ctx.cleanup().await.unwrap();
}
