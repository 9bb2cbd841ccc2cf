//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        DbAdapter, DocxRenderer, ImageResizer, LocalFileStore, OpenAiTextAdapter, PdfRenderer,
        SmtpMailer,
    },
    config::{Config, ConfigError},
    error::ApiError,
    web::{build_router, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use quillwright_core::{MailService, TextGenerationService};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
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
    db_adapter
        .run_migrations()
        .await
        .map_err(|e| ApiError::Internal(format!("Migration failed: {e}")))?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let llm: Option<Arc<dyn TextGenerationService>> = match &config.openai_api_key {
        Some(key) => {
            let openai_config = OpenAIConfig::new().with_api_key(key.expose_secret());
            let client = Client::with_config(openai_config);
            Some(Arc::new(OpenAiTextAdapter::new(client, config.ai_model.clone())))
        }
        None => {
            warn!("OPENAI_API_KEY not set, AI endpoints will fail");
            None
        }
    };

    let mailer: Option<Arc<dyn MailService>> = match &config.mail {
        Some(mail_config) => {
            let mailer = SmtpMailer::new(mail_config)
                .map_err(|e| ApiError::Internal(format!("SMTP setup failed: {e}")))?;
            Some(Arc::new(mailer))
        }
        None => {
            warn!("SMTP_HOST not set, outgoing mail is disabled");
            None
        }
    };

    let files = LocalFileStore::new(config.upload_dir.clone());
    files.ensure_root().await?;

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        llm,
        mailer,
        files: Arc::new(files),
        images: Arc::new(ImageResizer),
        pdf_renderer: Arc::new(PdfRenderer),
        docx_renderer: Arc::new(DocxRenderer),
    });

    // --- 5. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|_| {
        ConfigError::InvalidValue(
            "CORS_ORIGIN".to_string(),
            format!("'{}' is not a valid origin", config.cors_origin),
        )
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(build_router(app_state, true))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
