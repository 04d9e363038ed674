use std::sync::Arc;

use orderline_agent::{notifier_from_config, NotifyError, OrderService, ReceiptRenderer, ToolContext, ToolRegistry};
use orderline_core::config::{AppConfig, ConfigError, LoadOptions};
use orderline_core::engine::OrderEngine;
use orderline_core::menu::{MenuCatalog, MenuError};
use orderline_core::session::SessionStore;
use orderline_db::{connect_with_config, migrations, DbPool, OrderRepository, SqlOrderRepository};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub registry: Arc<ToolRegistry>,
    pub context: Arc<ToolContext>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Menu(#[from] MenuError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("notifications could not be set up: {0}")]
    Notifications(#[from] NotifyError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", correlation_id = "bootstrap", "starting application bootstrap");

    let catalog = match &config.menu.path {
        Some(path) => MenuCatalog::load(path)?,
        None => MenuCatalog::reference()?,
    };
    info!(
        event_name = "system.bootstrap.menu_loaded",
        correlation_id = "bootstrap",
        business = %catalog.business().name,
        categories = catalog.categories().len(),
        source = config.menu.path.as_ref().map(|path| path.display().to_string()).unwrap_or_else(|| "reference".to_string()),
        "menu loaded"
    );

    let db_pool = connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let notifier = notifier_from_config(&config.notifications)?;
    let orders = OrderService::new(
        Arc::new(SqlOrderRepository::new(db_pool.clone())) as Arc<dyn OrderRepository>,
        notifier,
        ReceiptRenderer::embedded()?,
    );
    let context = ToolContext::new(
        OrderEngine::new(Arc::new(catalog), config.limits.order_limits()),
        SessionStore::new(config.limits.session_policy()),
        orders,
    );

    Ok(Application {
        config,
        db_pool,
        registry: Arc::new(ToolRegistry::with_default_tools()),
        context: Arc::new(context),
    })
}


#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use orderline_core::config::{ConfigOverrides, LoadOptions};

    use super::{bootstrap, BootstrapError};

    fn options(overrides: ConfigOverrides) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..overrides
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_wires_menu_database_and_tools() {
        let app = bootstrap(options(ConfigOverrides::default())).await.expect("bootstrap succeeds");

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('orders', 'order_items')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("count tables");
        assert_eq!(tables, 2);
        assert_eq!(app.registry.len(), 15);
        assert_eq!(app.context.engine.catalog().business().name, "Golden Grill Kebabs");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn missing_menu_file_fails_fast() {
        let result = bootstrap(options(ConfigOverrides {
            menu_path: Some(PathBuf::from("/nonexistent/menu.toml")),
            ..ConfigOverrides::default()
        }))
        .await;

        assert!(matches!(result, Err(BootstrapError::Menu(_))));
    }

    #[tokio::test]
    async fn enabled_notifications_need_an_endpoint() {
        let result = bootstrap(options(ConfigOverrides {
            notifications_enabled: Some(true),
            ..ConfigOverrides::default()
        }))
        .await;

        let message = result.err().map(|error| error.to_string()).unwrap_or_default();
        assert!(message.contains("notifications"), "unexpected error: {message}");
    }
}
