//! Rubrica - a hierarchical content catalog

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rubrica::{
    api::{self, AppState},
    cache::create_cache,
    config::Config,
    db::{
        self,
        repositories::{
            SqlxImageRepository, SqlxItemRepository, SqlxSectionRepository,
            SqlxTreeItemRepository, SqlxUserRepository,
        },
    },
    models::UserRole,
    render::{TemplateEngine, TreeMode},
    services::{AuthService, CatalogService, ContentRegistry},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rubrica=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rubrica catalog...");

    // Load configuration
    let config = Config::load(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Initialize cache
    let cache = create_cache(&config.cache);
    tracing::info!("Cache initialized");

    // Content kinds and their grid/filter configuration
    let registry = ContentRegistry::from_config(&config.catalog);

    // Create repositories and services
    let catalog = Arc::new(CatalogService::new(
        SqlxTreeItemRepository::boxed(pool.clone()),
        SqlxSectionRepository::boxed(pool.clone()),
        SqlxItemRepository::boxed(pool.clone()),
        SqlxImageRepository::boxed(pool.clone()),
        registry,
        cache,
        config.catalog.grid_page_size,
    ));
    let auth = Arc::new(AuthService::new(SqlxUserRepository::boxed(pool.clone())));

    // Seed the initial admin account so a fresh database is usable
    if auth
        .ensure_user(&config.admin.username, &config.admin.password, UserRole::Admin)
        .await?
    {
        tracing::warn!(
            username = %config.admin.username,
            "Created initial admin account; change its password"
        );
    }

    // Template engine: embedded defaults, overridable on disk
    let templates = Arc::new(TemplateEngine::new(&config.templates.path)?);
    tracing::info!("Template engine initialized");

    let menu_mode = config.templates.menu_mode.parse::<TreeMode>()?;

    let state = AppState {
        catalog,
        auth: auth.clone(),
        templates,
        menu_mode,
    };

    // Expired session cleanup task (runs hourly)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match auth.purge_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Purged expired sessions"),
                Err(err) => tracing::warn!("Session cleanup failed: {}", err),
            }
        }
    });

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
