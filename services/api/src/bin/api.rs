//! services/api/src/bin/api.rs

use std::sync::Arc;

use api_lib::{
    adapters::{db::DbAdapter, oidc::OidcAdapter},
    config::Config,
    error::ApiError,
    web::{
        attach_session, current_user_handler, login_callback_handler, logout_handler,
        rest::ApiDoc, state::AppState,
    },
};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE, COOKIE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use chat_auth_core::ports::IdentityProviderService;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Identity Provider Adapter (optional) ---
    let provider: Option<Arc<dyn IdentityProviderService>> = match &config.oidc {
        Some(settings) => {
            info!(token_endpoint = %settings.token_endpoint, "OIDC provider configured");
            Some(Arc::new(OidcAdapter::new(
                reqwest::Client::new(),
                settings.clone(),
            )))
        }
        None => {
            info!("No OIDC provider configured; logins are disabled, logout redirects home");
            None
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = AppState {
        db: db_adapter,
        provider,
        config: config.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .public_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("invalid PUBLIC_ORIGIN: {e}")))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, COOKIE]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/login/callback", get(login_callback_handler))
        .route("/logout", post(logout_handler))
        .route("/user", get(current_user_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            attach_session,
        ))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
