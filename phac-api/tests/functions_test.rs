/// Router-level tests for the public process/download endpoints
///
/// These never touch the database, so they run without `DATABASE_URL`.

mod common;

use axum::http::{header, StatusCode};
use common::{body_bytes, body_json, json_post, lazy_app};
use serde_json::json;
use std::io::{Cursor, Read};
use tower::ServiceExt;
use zip::ZipArchive;

#[tokio::test]
async fn test_process_files_protects_lua_and_js() {
    let request = json_post(
        "/functions/v1/process-files",
        &json!({
            "files": [
                { "name": "client.lua", "content": "local health = 100\nprint(health)", "type": "lua" },
                { "name": "ui.js", "content": "// comment\nvar total = 1;", "type": "JS" },
                { "name": "config.json", "content": "{ \"a\": 1 }", "type": "json" }
            ],
            "protectionLevel": "standard",
            "licenseKey": "phac_test",
            "userId": "someone"
        }),
    );

    let response = lazy_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["stats"]["total"], 3);
    assert_eq!(body["stats"]["lua"], 1);
    assert_eq!(body["stats"]["js"], 1);
    assert_eq!(body["stats"]["json"], 1);

    let files = body["files"].as_array().unwrap();
    assert_eq!(files[1]["type"], "js");
    assert_eq!(files[2]["content"], "{\"a\":1}");
    assert!(files[0]["content"]
        .as_str()
        .unwrap()
        .contains("STANDARD"));

    let encryption_id = body["encryptionId"].as_str().unwrap();
    assert!(body["zipFilename"]
        .as_str()
        .unwrap()
        .ends_with(&format!("-{}.zip", encryption_id)));
    assert!(body["loaderCode"].is_string());
    assert_eq!(body["dateStr"].as_str().unwrap().len(), 8);
}

#[tokio::test]
async fn test_process_files_without_lua_has_null_loader() {
    let request = json_post(
        "/functions/v1/process-files",
        &json!({
            "files": [{ "name": "style.css", "content": "a { color: red; }", "type": "css" }],
            "protectionLevel": "advanced"
        }),
    );

    let response = lazy_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["loaderCode"].is_null());
}

#[tokio::test]
async fn test_process_files_empty_is_bad_request() {
    let request = json_post(
        "/functions/v1/process-files",
        &json!({ "files": [], "protectionLevel": "standard" }),
    );

    let response = lazy_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_process_files_unknown_level_is_unprocessable() {
    let request = json_post(
        "/functions/v1/process-files",
        &json!({
            "files": [{ "name": "a.lua", "content": "print(1)", "type": "lua" }],
            "protectionLevel": "ultra"
        }),
    );

    let response = lazy_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_download_protected_returns_zip() {
    let request = json_post(
        "/functions/v1/download-protected",
        &json!({
            "files": [
                { "name": "client.lua", "content": "-- protected", "type": "lua" },
                { "name": "ui.js", "content": "var a=1;", "type": "js" }
            ],
            "encryptionId": "LOYW3V28-AB12",
            "licenseKey": "phac_test"
        }),
    );

    let response = lazy_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(headers[header::PRAGMA], "no-cache");
    assert_eq!(headers[header::EXPIRES], "0");

    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"phacprotect-"));
    assert!(disposition.ends_with("-LOYW3V28-AB12.zip\""));

    let bytes = body_bytes(response).await;
    assert_eq!(
        headers[header::CONTENT_LENGTH].to_str().unwrap(),
        bytes.len().to_string()
    );

    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 4);

    let mut content = String::new();
    archive
        .by_name("client.lua")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "-- protected");
    assert!(archive.by_name("README.txt").is_ok());
}

#[tokio::test]
async fn test_download_protected_empty_is_bad_request() {
    let request = json_post(
        "/functions/v1/download-protected",
        &json!({ "files": [], "encryptionId": "ABC", "licenseKey": "k" }),
    );

    let response = lazy_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_protected_rejects_path_escape() {
    let request = json_post(
        "/functions/v1/download-protected",
        &json!({
            "files": [{ "name": "../evil.lua", "content": "x", "type": "lua" }],
            "encryptionId": "ABC",
            "licenseKey": "k"
        }),
    );

    let response = lazy_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_protected_rejects_quoted_license_key() {
    let request = json_post(
        "/functions/v1/download-protected",
        &json!({
            "files": [{ "name": "client.lua", "content": "x", "type": "lua" }],
            "encryptionId": "ABC-1234",
            "licenseKey": "x\" os.execute(\"echo pwned\") --"
        }),
    );

    let response = lazy_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid license key"));
}

#[tokio::test]
async fn test_responses_carry_security_headers() {
    let request = json_post(
        "/functions/v1/process-files",
        &json!({ "files": [], "protectionLevel": "standard" }),
    );

    let response = lazy_app().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}
