//! Removes the calculator's stored identity and version.
//!
//! The next start of the host registers the site again.

use ch7_calculator_client::{
    backend::BackendClient, config::Config, identity::IdentityStore, lifecycle::Calculator,
    option_store::open_option_store,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let Some(database_url) = config.database_url.as_deref() else {
        anyhow::bail!("DATABASE_URL must be set, there is nothing to deactivate in memory");
    };

    let options = open_option_store(Some(database_url)).await?;
    let identities = Arc::new(IdentityStore::new(options));

    if let Some(identity) = identities.current().await {
        tracing::info!("Deactivating calculator registered as {}", identity.app_id);
    }

    let backend = BackendClient::new(config.backend_url.clone(), config.api_key.clone())
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let calculator = Calculator::new(
        backend,
        identities,
        config.site_profile(),
        config.settings_cache_ttl(),
    );

    calculator
        .on_deactivate()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    tracing::info!("Deactivation complete.");
    Ok(())
}
