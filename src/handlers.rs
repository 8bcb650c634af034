use crate::errors::AppError;
use crate::lifecycle::Calculator;
use crate::models::{CalculationSubmission, ConnectionStatus};
use crate::sanitize::{coerce_int, decode_json_field, sanitize_email, sanitize_text_field};
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub calculator: Arc<Calculator>,
}

/// Raw submission posted by the calculator widget.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubmissionForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    /// Accepts both spellings; the widget historically posts `anual_income`.
    #[serde(alias = "anual_income")]
    pub annual_income: Value,
    pub location: String,
    pub debt_ratio: String,
    pub eligibility: String,
    pub calculation_data: Value,
    pub calculation_results: Value,
}

impl SubmissionForm {
    /// Sanitizes every field into a record ready for the backend.
    pub fn into_submission(self) -> CalculationSubmission {
        let annual_income = match &self.annual_income {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            Value::String(s) => coerce_int(s),
            _ => 0,
        };

        CalculationSubmission {
            first_name: sanitize_text_field(&self.first_name),
            last_name: sanitize_text_field(&self.last_name),
            email: sanitize_email(&self.email),
            phone: sanitize_text_field(&self.phone),
            annual_income,
            location: sanitize_text_field(&self.location),
            debt_ratio: sanitize_text_field(&self.debt_ratio),
            eligibility: sanitize_text_field(&self.eligibility),
            calculation_data: decode_json_field(self.calculation_data),
            calculation_results: decode_json_field(self.calculation_results),
            ..Default::default()
        }
    }
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "ch7-calculator",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/v1/calculator/settings
///
/// Settings for rendering the widget. Always succeeds.
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<Value> {
    let settings = state.calculator.on_render_request().await;
    Json(json!({
        "success": true,
        "data": { "settings": settings }
    }))
}

/// POST /api/v1/calculator/submissions
pub async fn submit_calculation(
    State(state): State<Arc<AppState>>,
    Json(form): Json<SubmissionForm>,
) -> Result<Json<Value>, AppError> {
    let record = form.into_submission();
    tracing::info!("POST /calculator/submissions - eligibility: {}", record.eligibility);

    let ack = state.calculator.on_submission_request(record).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Calculation submitted successfully",
        "data": ack.data
    })))
}

/// GET /api/v1/status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<ConnectionStatus> {
    Json(state.calculator.status().await)
}

/// POST /api/v1/register
///
/// Registers the site if it is not registered yet; otherwise returns the
/// existing identity.
pub async fn register(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let identity = state.calculator.register_now().await?;
    Ok(Json(json!({
        "success": true,
        "data": identity
    })))
}
