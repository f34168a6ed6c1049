use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use storage::{
    Database,
    repository::{PgRegistrationStore, PgTeamFeeLookup},
    services::{
        DiscountService, MetadataFormValidator, NoInsuranceOffers, ReconciliationOrchestrator,
    },
};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod features;
mod middleware;
mod state;

use config::Config;
use middleware::auth::ApiKeys;
use state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        features::registrations::handlers::reconcile_selections,
        features::discounts::handlers::apply_discount,
        features::health::health,
    ),
    components(
        schemas(
            storage::dto::registration::ReconcileRequest,
            storage::dto::registration::TeamSelection,
            storage::dto::registration::ReconcileResponse,
            storage::dto::registration::TeamResult,
            storage::dto::registration::NextTab,
            storage::dto::registration::FieldValidationError,
            storage::dto::discount::ApplyDiscountRequest,
            storage::dto::discount::ApplyDiscountResponse,
            storage::dto::discount::DiscountAdjustment,
            storage::dto::discount::SkippedRegistration,
            storage::models::Registration,
            storage::models::Team,
            features::health::HealthResponse,
        )
    ),
    tags(
        (name = "registrations", description = "Team selection and registration reconciliation"),
        (name = "discounts", description = "Discount code redemption"),
        (name = "health", description = "Service health"),
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("API Key")
                        .build(),
                ),
            )
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting registration API");

    let config = Config::from_env().context("Failed to load API configuration")?;
    tracing::info!(
        cc_percent = %config.cc_processing_percent,
        validation_fail_open = config.validation_fail_open,
        "Configuration loaded successfully"
    );

    tracing::info!(
        "Connecting to database at: {}",
        config
            .database_url
            .split('@')
            .next_back()
            .unwrap_or("unknown")
    );
    let db = Database::new(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations");
    db.run_migrations()
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations completed successfully");

    let settings = config.registration_settings();
    let store = Arc::new(PgRegistrationStore::new(db.pool().clone()));
    let fee_lookup = Arc::new(PgTeamFeeLookup::new(db.pool().clone()));

    let orchestrator = ReconciliationOrchestrator::new(
        store.clone(),
        fee_lookup,
        Arc::new(MetadataFormValidator),
        Arc::new(NoInsuranceOffers),
        settings,
    );
    let discounts = DiscountService::new(store, settings);

    let shutdown = CancellationToken::new();
    let state = AppState {
        db,
        orchestrator: Arc::new(orchestrator),
        discounts: Arc::new(discounts),
        shutdown: shutdown.clone(),
    };

    let api_keys = ApiKeys::from_comma_separated(&config.api_keys);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    let app = Router::new()
        .nest(
            "/api/jobs",
            features::registrations::routes::routes(api_keys.clone())
                .merge(features::discounts::routes::routes(api_keys)),
        )
        .merge(features::health::routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state);

    let bind_address = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server at http://{}", bind_address);
    tracing::info!(
        "Swagger UI available at http://{}/swagger-ui/",
        bind_address
    );

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, cancelling in-flight reconciliations first
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
