use crate::backend::BackendClient;
use crate::errors::{AppError, ClientError, RegistrationError, SubmissionError};
use crate::identity::IdentityStore;
use crate::models::{
    CalculationSubmission, CalculatorSettings, ConnectionStatus, SiteIdentity, SiteProfile,
    SubmissionAck,
};
use crate::option_store::OPTION_VERSION;
use crate::registration::RegistrationClient;
use crate::settings::SettingsClient;
use crate::submission::SubmissionClient;
use std::sync::Arc;
use std::time::Duration;

/// The calculator integration as seen by its host.
///
/// Each method corresponds to a lifecycle event the host dispatches. The
/// identity is read from the `IdentityStore` on every event.
pub struct Calculator {
    profile: SiteProfile,
    identities: Arc<IdentityStore>,
    registration: RegistrationClient,
    settings: SettingsClient,
    submission: SubmissionClient,
}

impl Calculator {
    pub fn new(
        backend: BackendClient,
        identities: Arc<IdentityStore>,
        profile: SiteProfile,
        settings_cache_ttl: Duration,
    ) -> Self {
        Self {
            profile,
            identities,
            registration: RegistrationClient::new(backend.clone()),
            settings: SettingsClient::with_cache_ttl(backend.clone(), settings_cache_ttl),
            submission: SubmissionClient::new(backend),
        }
    }

    pub fn identities(&self) -> &Arc<IdentityStore> {
        &self.identities
    }

    /// Records the installed version and registers the site if needed.
    ///
    /// Registration failure is logged and swallowed; the calculator keeps
    /// working with default settings.
    pub async fn on_startup(&self) -> Option<SiteIdentity> {
        let options = self.identities.options();
        match options.get(OPTION_VERSION).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(e) = options.set(OPTION_VERSION, env!("CARGO_PKG_VERSION")).await {
                    tracing::warn!("Failed to record calculator version: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to read calculator version: {}", e),
        }

        match self
            .registration
            .ensure_registered(&self.profile, &self.identities)
            .await
        {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::warn!(
                    "Site registration failed, continuing with default settings: {}",
                    e
                );
                None
            }
        }
    }

    /// Settings for one widget render.
    pub async fn on_render_request(&self) -> CalculatorSettings {
        let identity = self.identities.current().await;
        self.settings.fetch_settings(identity.as_ref()).await
    }

    /// Forwards one completed calculation.
    pub async fn on_submission_request(
        &self,
        record: CalculationSubmission,
    ) -> Result<SubmissionAck, SubmissionError> {
        let identity = self
            .identities
            .load()
            .await
            .map_err(ClientError::from)?;
        self.submission.submit(identity.as_ref(), record).await
    }

    /// Registers now if the site is not registered yet.
    pub async fn register_now(&self) -> Result<SiteIdentity, RegistrationError> {
        self.registration
            .ensure_registered(&self.profile, &self.identities)
            .await
    }

    pub async fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from(self.identities.current().await.as_ref())
    }

    /// Forgets the identity, the recorded version and any cached settings.
    pub async fn on_deactivate(&self) -> Result<(), AppError> {
        self.identities.clear().await?;
        self.settings.invalidate();
        tracing::info!("Calculator deactivated, stored options removed");
        Ok(())
    }
}
