use crate::backend::{BackendClient, SETTINGS_PATH};
use crate::errors::ClientError;
use crate::models::{CalculatorSettings, SiteIdentity};
use moka::future::Cache;
use std::time::Duration;

/// Fetches the calculator configuration, falling back to the built-in
/// document on any failure.
#[derive(Clone)]
pub struct SettingsClient {
    backend: BackendClient,
    /// Remote documents keyed by app_id. `None` when caching is disabled.
    cache: Option<Cache<String, CalculatorSettings>>,
}

impl SettingsClient {
    /// Creates a client that re-fetches on every call.
    pub fn new(backend: BackendClient) -> Self {
        Self {
            backend,
            cache: None,
        }
    }

    /// Creates a client that keeps remote documents for `ttl`. A zero `ttl`
    /// disables caching.
    pub fn with_cache_ttl(backend: BackendClient, ttl: Duration) -> Self {
        let cache = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .time_to_live(ttl)
                .max_capacity(64)
                .build()
        });
        Self { backend, cache }
    }

    /// Returns a usable settings document. Never fails.
    ///
    /// Without an identity (or with a blank `app_id`) the default document is
    /// returned and no request is made.
    pub async fn fetch_settings(&self, identity: Option<&SiteIdentity>) -> CalculatorSettings {
        let Some(identity) = identity.filter(|id| id.has_app_id()) else {
            tracing::debug!("Site not registered, using default calculator settings");
            return CalculatorSettings::default();
        };

        if let Some(cache) = &self.cache {
            if let Some(settings) = cache.get(&identity.app_id).await {
                tracing::debug!("Calculator settings served from cache");
                return settings;
            }
        }

        match self.fetch_remote(&identity.app_id).await {
            Ok(settings) => {
                if let Some(cache) = &self.cache {
                    cache
                        .insert(identity.app_id.clone(), settings.clone())
                        .await;
                }
                settings
            }
            Err(e) => {
                tracing::warn!("Falling back to default calculator settings: {}", e);
                CalculatorSettings::default()
            }
        }
    }

    /// Drops every cached document.
    pub fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    async fn fetch_remote(&self, app_id: &str) -> Result<CalculatorSettings, ClientError> {
        tracing::debug!("Fetching calculator settings for {}", app_id);

        let envelope = self
            .backend
            .exchange(
                self.backend.get_authed(
                    SETTINGS_PATH,
                    &[("app_id", app_id)],
                    self.backend.timeouts().settings,
                ),
                "Settings fetch",
            )
            .await?;

        if !envelope.success {
            return Err(ClientError::BackendRejected(
                envelope
                    .message
                    .unwrap_or_else(|| "success flag was false".to_string()),
            ));
        }

        let settings = envelope
            .data
            .and_then(|mut data| data.get_mut("settings").map(serde_json::Value::take))
            .ok_or_else(|| {
                ClientError::MalformedResponse("response missing data.settings".to_string())
            })?;

        let settings: CalculatorSettings = serde_json::from_value(settings).map_err(|e| {
            ClientError::MalformedResponse(format!("unreadable settings document: {}", e))
        })?;

        if !settings.is_within_bounds() {
            return Err(ClientError::MalformedResponse(format!(
                "settings out of range (debt_ratio_threshold={})",
                settings.debt_ratio_threshold
            )));
        }
        Ok(settings)
    }
}
