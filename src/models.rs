use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Owner name sent when no identified owner is known.
pub const DEFAULT_OWNER_NAME: &str = "Site Owner";

// ============ Identity ============

/// Durable identity issued by the backend on first registration.
///
/// Absence of a `SiteIdentity` means the site is unregistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteIdentity {
    /// Opaque token uniquely identifying this site on the backend.
    pub app_id: String,
    /// Backend dashboard where the site owner configures the calculator.
    pub dashboard_url: String,
}

impl SiteIdentity {
    /// An identity with a blank `app_id` cannot key any backend request.
    pub fn has_app_id(&self) -> bool {
        !self.app_id.trim().is_empty()
    }
}

/// Everything the host knows about the site when registration runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub site_name: String,
    pub site_url: String,
    pub admin_email: String,
    /// Display name of the identified owner, if any.
    pub owner_name: Option<String>,
    /// Email of the identified owner, if any.
    pub owner_email: Option<String>,
}

impl SiteProfile {
    /// Builds the registration payload, filling owner fields from the
    /// placeholder name and the admin email when no owner is known.
    pub fn to_request(&self) -> SiteRegistrationRequest {
        let owner_name = self
            .owner_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_OWNER_NAME)
            .to_string();
        let owner_email = self
            .owner_email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.admin_email)
            .to_string();

        SiteRegistrationRequest {
            site_name: self.site_name.clone(),
            site_url: self.site_url.clone(),
            admin_email: self.admin_email.clone(),
            owner_name,
            owner_email,
        }
    }
}

/// Body of `POST /api/sites/register`. Built per attempt, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRegistrationRequest {
    pub site_name: String,
    pub site_url: String,
    #[serde(rename = "wp_admin_email")]
    pub admin_email: String,
    pub owner_name: String,
    pub owner_email: String,
}

// ============ Calculator Settings ============

/// Median-income limits used by the means test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeThresholds {
    pub single: f64,
    pub married: f64,
}

/// Form layout options for the calculator widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormFields {
    pub show_debt_settlement_checkbox: bool,
    /// Ordered field names the widget marks as required.
    pub required_fields: Vec<String>,
}

/// Configuration document that drives the calculator widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorSettings {
    pub income_thresholds: IncomeThresholds,
    /// Ratio of debt to income, between 0 and 1.
    pub debt_ratio_threshold: f64,
    pub form_fields: FormFields,
}

impl CalculatorSettings {
    /// Thresholds are non-negative and the debt ratio lies in `0..=1`.
    pub fn is_within_bounds(&self) -> bool {
        (0.0..=1.0).contains(&self.debt_ratio_threshold)
            && self.income_thresholds.single >= 0.0
            && self.income_thresholds.married >= 0.0
    }
}

impl Default for CalculatorSettings {
    /// Built-in document used when the backend is unreachable or the site is
    /// unregistered.
    fn default() -> Self {
        Self {
            income_thresholds: IncomeThresholds {
                single: 50_000.0,
                married: 75_000.0,
            },
            debt_ratio_threshold: 0.4,
            form_fields: FormFields {
                show_debt_settlement_checkbox: true,
                required_fields: ["first_name", "last_name", "email", "phone"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            },
        }
    }
}

// ============ Submissions ============

/// One completed calculator run, as transmitted to `POST /api/calculator/ch7`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationSubmission {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(rename = "anual_income")]
    pub annual_income: i64,
    pub location: String,
    pub debt_ratio: String,
    pub eligibility: String,
    pub calculation_data: Value,
    pub calculation_results: Value,
    /// Injected by the submission client; any caller-supplied value is overwritten.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    /// Additional widget fields forwarded untouched, except a stray `app_id`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Backend acknowledgement of a stored submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionAck {
    pub data: Value,
}

// ============ Backend wire types ============

/// Response envelope shared by every backend endpoint.
///
/// A missing `success` flag reads as `false`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `data` payload of a successful registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationData {
    pub app_id: String,
    pub dashboard_url: String,
}

/// Connection summary shown to site administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub registered: bool,
    pub app_id: Option<String>,
    pub dashboard_url: Option<String>,
}

impl From<Option<&SiteIdentity>> for ConnectionStatus {
    fn from(identity: Option<&SiteIdentity>) -> Self {
        match identity {
            Some(id) => Self {
                registered: true,
                app_id: Some(id.app_id.clone()),
                dashboard_url: Some(id.dashboard_url.clone()).filter(|u| !u.is_empty()),
            },
            None => Self {
                registered: false,
                app_id: None,
                dashboard_url: None,
            },
        }
    }
}
