use crate::backend::{BackendClient, SUBMIT_PATH};
use crate::errors::{ClientError, SubmissionError};
use crate::models::{CalculationSubmission, SiteIdentity, SubmissionAck};

const SUBMIT_FAILED: &str = "Failed to submit calculation";

/// Sends completed calculator runs to the backend.
#[derive(Debug, Clone)]
pub struct SubmissionClient {
    backend: BackendClient,
}

impl SubmissionClient {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Submits `record` on behalf of `identity`.
    ///
    /// Fails with `NotRegistered` before any request when `identity` is absent
    /// or has a blank `app_id`.
    /// The identity's `app_id` always replaces whatever the record carried.
    /// Every other failure is reported as `BackendRejected` with a generic
    /// message; the cause is logged.
    pub async fn submit(
        &self,
        identity: Option<&SiteIdentity>,
        mut record: CalculationSubmission,
    ) -> Result<SubmissionAck, SubmissionError> {
        let identity = identity
            .filter(|id| id.has_app_id())
            .ok_or(ClientError::NotRegistered)?;
        record.extra.remove("app_id");
        record.app_id = Some(identity.app_id.clone());

        let result = self
            .backend
            .exchange(
                self.backend.post_json_authed(
                    SUBMIT_PATH,
                    &record,
                    self.backend.timeouts().submit,
                ),
                "Calculation submission",
            )
            .await
            .and_then(|envelope| match (envelope.success, envelope.data) {
                (true, Some(data)) => Ok(SubmissionAck { data }),
                (true, None) => Err(ClientError::MalformedResponse(
                    "submission response missing 'data'".to_string(),
                )),
                (false, _) => Err(ClientError::BackendRejected(
                    envelope
                        .message
                        .unwrap_or_else(|| "success flag was false".to_string()),
                )),
            });

        match result {
            Ok(ack) => {
                tracing::info!("✓ Calculation submitted for {}", identity.app_id);
                Ok(ack)
            }
            Err(e) => {
                tracing::warn!("Calculation submission failed: {}", e);
                Err(ClientError::BackendRejected(SUBMIT_FAILED.to_string()))
            }
        }
    }
}
