use crate::errors::AppError;
use crate::models::SiteIdentity;
use crate::option_store::{OptionStore, OPTION_APP_ID, OPTION_DASHBOARD_URL, OPTION_VERSION};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Reads and writes the persisted `SiteIdentity`.
///
/// Passed explicitly to every client operation; nothing in the crate keeps
/// the identity in ambient state.
pub struct IdentityStore {
    options: Arc<dyn OptionStore>,
    registration: Mutex<()>,
}

impl IdentityStore {
    pub fn new(options: Arc<dyn OptionStore>) -> Self {
        Self {
            options,
            registration: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &Arc<dyn OptionStore> {
        &self.options
    }

    /// Returns the cached identity, or `None` when the site is unregistered.
    ///
    /// An empty `app_id` counts as unregistered. A missing dashboard URL reads
    /// as the empty string.
    pub async fn load(&self) -> Result<Option<SiteIdentity>, AppError> {
        let app_id = match self.options.get(OPTION_APP_ID).await? {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Ok(None),
        };
        let dashboard_url = self
            .options
            .get(OPTION_DASHBOARD_URL)
            .await?
            .unwrap_or_default();

        Ok(Some(SiteIdentity {
            app_id,
            dashboard_url,
        }))
    }

    /// Same as [`load`](Self::load) but treats a storage failure as unregistered.
    pub async fn current(&self) -> Option<SiteIdentity> {
        match self.load().await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::error!("Failed to read site identity: {}", e);
                None
            }
        }
    }

    /// Commits both identity values in one write.
    pub async fn persist(&self, identity: &SiteIdentity) -> Result<(), AppError> {
        self.options
            .set_many(&[
                (OPTION_APP_ID, identity.app_id.as_str()),
                (OPTION_DASHBOARD_URL, identity.dashboard_url.as_str()),
            ])
            .await
    }

    /// Removes every option the calculator owns.
    pub async fn clear(&self) -> Result<(), AppError> {
        for key in [OPTION_APP_ID, OPTION_DASHBOARD_URL, OPTION_VERSION] {
            self.options.delete(key).await?;
        }
        Ok(())
    }

    /// Serialises "check identity absent, then register" across callers.
    pub(crate) async fn lock_registration(&self) -> MutexGuard<'_, ()> {
        self.registration.lock().await
    }
}
