use crate::models::SiteProfile;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub backend_url: String,
    pub api_key: String,
    pub site_name: String,
    pub site_url: String,
    pub admin_email: String,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub database_url: Option<String>, // In-memory option store when unset
    pub port: u16,
    pub settings_cache_ttl_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("backend_url", &self.backend_url)
            .field("api_key", &"[REDACTED]")
            .field("site_name", &self.site_name)
            .field("site_url", &self.site_url)
            .field("admin_email", &self.admin_email)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("port", &self.port)
            .field("settings_cache_ttl_secs", &self.settings_cache_ttl_secs)
            .finish()
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> anyhow::Result<String> {
    let value = lookup(key)
        .ok_or_else(|| anyhow::anyhow!("{} environment variable required", key))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", key);
    }
    Ok(value.trim().to_string())
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Backend URL: {}", config.backend_url);
        tracing::debug!("Site: {} ({})", config.site_name, config.site_url);
        if config.database_url.is_some() {
            tracing::info!("Postgres option store configured");
        } else {
            tracing::warn!("DATABASE_URL not set, site identity will not survive restarts");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Parses configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            backend_url: required(&lookup, "BACKEND_URL").and_then(|url| {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("BACKEND_URL must start with http:// or https://");
                }
                Ok(url.trim_end_matches('/').to_string())
            })?,
            api_key: required(&lookup, "CALCULATOR_API_KEY")?,
            site_name: required(&lookup, "SITE_NAME")?,
            site_url: required(&lookup, "SITE_URL").and_then(|site| {
                url::Url::parse(&site)
                    .map_err(|e| anyhow::anyhow!("SITE_URL must be an absolute URL: {}", e))?;
                Ok(site)
            })?,
            admin_email: required(&lookup, "ADMIN_EMAIL")?,
            owner_name: optional(&lookup, "OWNER_NAME"),
            owner_email: optional(&lookup, "OWNER_EMAIL"),
            database_url: optional(&lookup, "DATABASE_URL")
                .map(|url| {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })
                .transpose()?,
            port: optional(&lookup, "PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            settings_cache_ttl_secs: optional(&lookup, "SETTINGS_CACHE_TTL_SECS")
                .unwrap_or_else(|| "60".to_string())
                .parse()
                .map_err(|_| {
                    anyhow::anyhow!("SETTINGS_CACHE_TTL_SECS must be a non-negative integer")
                })?,
        })
    }

    pub fn site_profile(&self) -> SiteProfile {
        SiteProfile {
            site_name: self.site_name.clone(),
            site_url: self.site_url.clone(),
            admin_email: self.admin_email.clone(),
            owner_name: self.owner_name.clone(),
            owner_email: self.owner_email.clone(),
        }
    }

    pub fn settings_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.settings_cache_ttl_secs)
    }
}
