/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use phac_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = phac_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use phac_shared::{auth::middleware::authenticate, credits::CreditLedger};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Secret for signing and validating JWTs
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// Credit ledger over the shared pool
    pub fn ledger(&self) -> CreditLedger {
        CreditLedger::new(self.db.clone())
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// ├── /functions/v1/                   # Stateless protection (public, any origin)
/// │   ├── POST /process-files
/// │   └── POST /download-protected
/// └── /v1/
///     ├── /auth/                       # Public
///     │   ├── POST /register
///     │   ├── POST /login
///     │   └── POST /refresh
///     └── (JWT required)
///         ├── GET|PUT /profile
///         ├── POST    /profile/password
///         ├── GET     /dashboard
///         ├── GET|POST /license-keys
///         ├── POST    /license-keys/:id/revoke
///         ├── DELETE  /license-keys/:id
///         ├── GET     /scripts
///         ├── POST    /scripts/protect
///         ├── POST    /analysis
///         ├── GET     /activity
///         └── GET     /billing
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, body limit, tracing, CORS (per
/// sub-router), JWT auth (protected routes only).
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let function_routes = Router::new()
        .route("/process-files", post(routes::functions::process_files))
        .route(
            "/download-protected",
            post(routes::functions::download_protected),
        )
        .layer(CorsLayer::permissive());

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let protected_routes = Router::new()
        .route(
            "/profile",
            get(routes::profile::get_profile).put(routes::profile::update_profile),
        )
        .route("/profile/password", post(routes::profile::change_password))
        .route("/dashboard", get(routes::dashboard::dashboard))
        .route(
            "/license-keys",
            get(routes::license_keys::list_license_keys)
                .post(routes::license_keys::create_license_key),
        )
        .route(
            "/license-keys/:id/revoke",
            post(routes::license_keys::revoke_license_key),
        )
        .route(
            "/license-keys/:id",
            axum::routing::delete(routes::license_keys::delete_license_key),
        )
        .route("/scripts", get(routes::scripts::list_scripts))
        .route("/scripts/protect", post(routes::scripts::protect_scripts))
        .route("/analysis", post(routes::analysis::analyze))
        .route("/activity", get(routes::activity::list_activity))
        .route("/billing", get(routes::billing::billing))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    let dashboard_routes = Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(cors_layer(&state.config));

    Router::new()
        .merge(dashboard_routes)
        .nest("/functions/v1", function_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.api.max_body_bytes))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// CORS for the dashboard API
///
/// `*` in `CORS_ORIGINS` allows any origin; otherwise only the listed ones.
fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Validates the bearer token and stores the `AuthContext` in the request
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_context = authenticate(req.headers(), state.jwt_secret())?;

    tracing::debug!(user_id = %auth_context.user_id, "Authenticated request");
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, DatabaseConfig, JwtConfig};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use phac_shared::auth::jwt::{create_token, Claims, TokenType};
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn test_state(cors_origins: Vec<String>) -> AppState {
        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                production: false,
                cors_origins,
                max_body_bytes: 1024 * 1024,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/phac_unused".to_string(),
                max_connections: 1,
            },
            jwt: JwtConfig {
                secret: SECRET.to_string(),
            },
        };
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database.url)
            .unwrap();

        AppState::new(pool, config)
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let app = build_router(test_state(vec!["*".to_string()]));

        let response = app
            .oneshot(Request::get("/v1/profile").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_token_rejected_on_protected_route() {
        let app = build_router(test_state(vec!["*".to_string()]));
        let refresh = create_token(&Claims::new(Uuid::new_v4(), TokenType::Refresh), SECRET)
            .unwrap();

        let response = app
            .oneshot(
                Request::get("/v1/billing")
                    .header(header::AUTHORIZATION, format!("Bearer {}", refresh))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = build_router(test_state(vec!["*".to_string()]));

        let response = app
            .oneshot(Request::get("/v2/nothing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_function_routes_allow_any_origin() {
        let app = build_router(test_state(vec!["https://app.phacprotect.com".to_string()]));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/functions/v1/process-files")
                    .header(header::ORIGIN, "https://elsewhere.example")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let app = build_router(test_state(vec!["*".to_string()]));
        let body = "x".repeat(2 * 1024 * 1024);

        let response = app
            .oneshot(
                Request::post("/functions/v1/process-files")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::CONTENT_LENGTH, body.len())
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
