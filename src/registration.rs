use crate::backend::{BackendClient, REGISTER_PATH};
use crate::errors::{ClientError, RegistrationError};
use crate::identity::IdentityStore;
use crate::models::{RegistrationData, SiteIdentity, SiteProfile};

/// Registers the site with the backend and persists the issued identity.
#[derive(Debug, Clone)]
pub struct RegistrationClient {
    backend: BackendClient,
}

impl RegistrationClient {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Performs one registration attempt.
    ///
    /// Does not check whether the site is already registered; use
    /// [`ensure_registered`](Self::ensure_registered) for that. On success both
    /// identity values are written before the identity is returned.
    pub async fn register(
        &self,
        profile: &SiteProfile,
        identities: &IdentityStore,
    ) -> Result<SiteIdentity, RegistrationError> {
        let request = profile.to_request();
        tracing::info!(
            "Registering site '{}' ({}) with backend",
            request.site_name,
            request.site_url
        );

        let envelope = self
            .backend
            .exchange(
                self.backend.post_json(
                    REGISTER_PATH,
                    &request,
                    self.backend.timeouts().register,
                ),
                "Site registration",
            )
            .await?;

        if !envelope.success {
            return Err(ClientError::BackendRejected(
                envelope
                    .message
                    .unwrap_or_else(|| "Registration rejected by backend".to_string()),
            ));
        }

        let data: RegistrationData = envelope
            .data
            .ok_or_else(|| {
                ClientError::MalformedResponse("Registration response missing 'data'".to_string())
            })
            .and_then(|data| {
                serde_json::from_value(data).map_err(|e| {
                    ClientError::MalformedResponse(format!(
                        "Registration response missing app_id or dashboard_url: {}",
                        e
                    ))
                })
            })?;

        if data.app_id.trim().is_empty() {
            return Err(ClientError::MalformedResponse(
                "Registration response carried an empty app_id".to_string(),
            ));
        }
        if data.dashboard_url.trim().is_empty() {
            return Err(ClientError::MalformedResponse(
                "Registration response carried an empty dashboard_url".to_string(),
            ));
        }

        let identity = SiteIdentity {
            app_id: data.app_id,
            dashboard_url: data.dashboard_url,
        };
        identities.persist(&identity).await?;

        tracing::info!(
            "✓ Site registered: app_id={} dashboard={}",
            identity.app_id,
            identity.dashboard_url
        );
        Ok(identity)
    }

    /// Returns the cached identity, registering first if there is none.
    ///
    /// Concurrent callers sharing one `IdentityStore` produce at most one
    /// remote registration: the absence check and the registration run under
    /// the store's registration lock.
    pub async fn ensure_registered(
        &self,
        profile: &SiteProfile,
        identities: &IdentityStore,
    ) -> Result<SiteIdentity, RegistrationError> {
        let _guard = identities.lock_registration().await;

        if let Some(identity) = identities.load().await? {
            tracing::debug!("Site already registered as {}", identity.app_id);
            return Ok(identity);
        }

        self.register(profile, identities).await
    }
}
