//! Common test utilities for integration tests
//!
//! - `lazy_app`: router over a pool that never connects, for routes that
//!   don't touch the database
//! - `TestContext`: migrated database, a registered user and its token
//! - Request/response helpers

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use phac_api::app::{build_router, AppState};
use phac_api::config::{ApiConfig, Config, DatabaseConfig, JwtConfig};
use phac_shared::auth::jwt::{create_token, Claims, TokenType};
use phac_shared::auth::password::hash_password;
use phac_shared::credits::SIGNUP_CREDITS;
use phac_shared::db::migrations::ensure_database_exists;
use phac_shared::models::profile::{CreateProfile, Profile};
use phac_shared::models::user::{CreateUser, User};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const TEST_PASSWORD: &str = "SecureP@ss123";

/// Config that never reaches a real database
pub fn offline_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            production: false,
            cors_origins: vec!["*".to_string()],
            max_body_bytes: 1024 * 1024,
        },
        database: DatabaseConfig {
            url: "postgresql://localhost/phac_unused".to_string(),
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
        },
    }
}

/// Router backed by a lazily connecting pool
pub fn lazy_app() -> Router {
    let config = offline_config();
    let pool = phac_shared::db::pool::create_lazy_pool(&phac_shared::db::pool::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: 1,
        ..Default::default()
    })
    .unwrap();

    build_router(AppState::new(pool, config))
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: Router,
    pub config: Config,
    pub user: User,
    pub jwt_token: String,
}

impl TestContext {
    /// Connects to `DATABASE_URL`, migrates and registers a fresh user
    pub async fn new() -> anyhow::Result<Self> {
        let mut config = offline_config();
        config.database.url = std::env::var("DATABASE_URL")?;

        ensure_database_exists(&config.database.url).await?;
        let db = PgPool::connect(&config.database.url).await?;

        // Path relative to Cargo.toml, not this file
        sqlx::migrate!("../migrations").run(&db).await?;

        let user = User::create(
            &db,
            CreateUser {
                email: format!("test-{}@example.com", Uuid::new_v4()),
                password_hash: hash_password(TEST_PASSWORD)?,
            },
        )
        .await?;

        Profile::create(
            &db,
            CreateProfile {
                user_id: user.id,
                name: "Test User".to_string(),
                company_name: "Test Company".to_string(),
                age: 30,
                credits_balance: SIGNUP_CREDITS,
            },
        )
        .await?;

        let jwt_token = create_token(&Claims::new(user.id, TokenType::Access), TEST_SECRET)?;

        let state = AppState::new(db.clone(), config.clone());
        let app = build_router(state);

        Ok(TestContext {
            db,
            app,
            config,
            user,
            jwt_token,
        })
    }

    /// Returns authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.jwt_token)
    }

    /// Sends an authenticated request
    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> Response<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, self.auth_header());

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Cleans up test data; profiles, keys, scripts and logs cascade
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        User::delete(&self.db, self.user.id).await?;
        Ok(())
    }
}

/// Unauthenticated JSON POST
pub fn json_post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
