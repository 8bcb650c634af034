/// Integration tests with a mocked calculator backend
/// Exercises registration, settings and submission without hitting the real service
use ch7_calculator_client::backend::{BackendClient, BackendTimeouts};
use ch7_calculator_client::errors::ClientError;
use ch7_calculator_client::identity::IdentityStore;
use ch7_calculator_client::lifecycle::Calculator;
use ch7_calculator_client::models::{
    CalculationSubmission, CalculatorSettings, SiteIdentity, SiteProfile,
};
use ch7_calculator_client::option_store::{MemoryOptionStore, OPTION_VERSION};
use ch7_calculator_client::registration::RegistrationClient;
use ch7_calculator_client::settings::SettingsClient;
use ch7_calculator_client::submission::SubmissionClient;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create a backend client pointing at the mock server
fn backend(uri: String) -> BackendClient {
    BackendClient::new(uri, "test_key")
        .unwrap()
        .with_timeouts(BackendTimeouts {
            register: Duration::from_millis(500),
            settings: Duration::from_millis(500),
            submit: Duration::from_millis(500),
        })
}

fn identities() -> Arc<IdentityStore> {
    Arc::new(IdentityStore::new(Arc::new(MemoryOptionStore::new())))
}

fn profile() -> SiteProfile {
    SiteProfile {
        site_name: "Smith Law".to_string(),
        site_url: "https://smithlaw.example".to_string(),
        admin_email: "admin@smithlaw.example".to_string(),
        owner_name: None,
        owner_email: None,
    }
}

fn identity() -> SiteIdentity {
    SiteIdentity {
        app_id: "A1".to_string(),
        dashboard_url: "https://x".to_string(),
    }
}

fn remote_settings() -> Value {
    json!({
        "income_thresholds": {"single": 61000, "married": 82000.5},
        "debt_ratio_threshold": 0.35,
        "form_fields": {
            "show_debt_settlement_checkbox": false,
            "required_fields": ["email", "first_name"]
        }
    })
}

fn out_of_range_settings(debt_ratio_threshold: f64) -> Value {
    let mut settings = remote_settings();
    settings["debt_ratio_threshold"] = json!(debt_ratio_threshold);
    settings
}

fn registration_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "data": {"app_id": "A1", "dashboard_url": "https://x"}
    }))
}

// ============ Registration ============

#[tokio::test]
async fn test_registration_persists_identity() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sites/register"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "site_name": "Smith Law",
            "site_url": "https://smithlaw.example",
            "wp_admin_email": "admin@smithlaw.example",
            "owner_name": "Site Owner",
            "owner_email": "admin@smithlaw.example"
        })))
        .respond_with(registration_ok())
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = identities();
    let client = RegistrationClient::new(backend(mock_server.uri()));

    let registered = client.register(&profile(), &store).await.unwrap();

    assert_eq!(registered, identity());
    assert_eq!(store.load().await.unwrap(), Some(identity()));
}

#[tokio::test]
async fn test_registration_does_not_send_api_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sites/register"))
        .respond_with(registration_ok())
        .mount(&mock_server)
        .await;

    let client = RegistrationClient::new(backend(mock_server.uri()));
    client.register(&profile(), &identities()).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("x-api-key"));
}

#[tokio::test]
async fn test_registration_rejected_leaves_identity_absent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sites/register"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "success": false,
            "message": "Site already exists"
        })))
        .mount(&mock_server)
        .await;

    let store = identities();
    let client = RegistrationClient::new(backend(mock_server.uri()));

    let result = client.register(&profile(), &store).await;

    assert_eq!(
        result,
        Err(ClientError::BackendRejected("Site already exists".to_string()))
    );
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_registration_non_json_body_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sites/register"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let store = identities();
    let client = RegistrationClient::new(backend(mock_server.uri()));

    let result = client.register(&profile(), &store).await;

    assert!(matches!(result, Err(ClientError::MalformedResponse(_))));
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_registration_missing_fields_is_malformed() {
    let incomplete = vec![
        json!({"app_id": "A1"}),
        json!({"app_id": "A1", "dashboard_url": ""}),
        json!({"app_id": "A1", "dashboard_url": "   "}),
        json!({"app_id": "", "dashboard_url": "https://x"}),
    ];

    for data in incomplete {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sites/register"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": data
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = identities();
        let client = RegistrationClient::new(backend(mock_server.uri()));

        let result = client.register(&profile(), &store).await;

        assert!(
            matches!(result, Err(ClientError::MalformedResponse(_))),
            "{:?} should be malformed",
            data
        );
        assert_eq!(store.load().await.unwrap(), None);
    }
}

#[tokio::test]
async fn test_registration_timeout_is_transport_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sites/register"))
        .respond_with(registration_ok().set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let store = identities();
    let client = RegistrationClient::new(backend(mock_server.uri()));

    let result = client.register(&profile(), &store).await;

    assert!(matches!(result, Err(ClientError::TransportFailure(_))));
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_ensure_registered_skips_network_when_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(registration_ok())
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = identities();
    store.persist(&identity()).await.unwrap();
    let client = RegistrationClient::new(backend(mock_server.uri()));

    let result = client.ensure_registered(&profile(), &store).await;

    assert_eq!(result, Ok(identity()));
}

#[tokio::test]
async fn test_concurrent_first_registration_registers_once() {
    let mock_server = MockServer::start().await;

    // Slow response so both callers are in flight before the first one commits
    Mock::given(method("POST"))
        .and(path("/api/sites/register"))
        .respond_with(registration_ok().set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = identities();
    let client = Arc::new(RegistrationClient::new(backend(mock_server.uri())));

    let mut handles = vec![];
    for _ in 0..2 {
        let client = client.clone();
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            client.ensure_registered(&profile(), &store).await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result, Ok(identity()));
    }

    assert_eq!(store.load().await.unwrap(), Some(identity()));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
}

// ============ Settings ============

#[tokio::test]
async fn test_settings_without_identity_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = SettingsClient::new(backend(mock_server.uri()));

    assert_eq!(
        client.fetch_settings(None).await,
        CalculatorSettings::default()
    );
}

#[tokio::test]
async fn test_settings_with_blank_app_id_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"settings": remote_settings()}
        })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let blank = SiteIdentity {
        app_id: "  ".to_string(),
        dashboard_url: "https://x".to_string(),
    };
    let client = SettingsClient::new(backend(mock_server.uri()));

    assert_eq!(
        client.fetch_settings(Some(&blank)).await,
        CalculatorSettings::default()
    );
}

#[tokio::test]
async fn test_settings_fetched_with_app_id_and_api_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/calculator/settings"))
        .and(query_param("app_id", "A1"))
        .and(header("X-API-Key", "test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"settings": remote_settings()}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = SettingsClient::new(backend(mock_server.uri()));
    let settings = client.fetch_settings(Some(&identity())).await;

    assert_eq!(settings.income_thresholds.single, 61000.0);
    assert_eq!(settings.income_thresholds.married, 82000.5);
    assert_eq!(settings.debt_ratio_threshold, 0.35);
    assert!(!settings.form_fields.show_debt_settlement_checkbox);
    assert_eq!(settings.form_fields.required_fields, vec!["email", "first_name"]);
}

#[tokio::test]
async fn test_settings_fall_back_on_bad_responses() {
    let bad_responses = vec![
        ResponseTemplate::new(200).set_body_json(json!({"success": false})),
        ResponseTemplate::new(200).set_body_json(json!({"success": false, "data": {"settings": remote_settings()}})),
        ResponseTemplate::new(200).set_body_string("not json"),
        ResponseTemplate::new(200).set_body_json(json!({"success": true})),
        ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": {}})),
        ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": {"settings": {"debt_ratio_threshold": "high"}}})),
        ResponseTemplate::new(200).set_body_json(json!({"data": {"settings": remote_settings()}})),
        ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": {"settings": out_of_range_settings(1.7)}})),
        ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": {"settings": out_of_range_settings(-0.2)}})),
        ResponseTemplate::new(500).set_body_string("Internal Server Error"),
    ];

    for response in bad_responses {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/calculator/settings"))
            .respond_with(response)
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = SettingsClient::new(backend(mock_server.uri()));
        assert_eq!(
            client.fetch_settings(Some(&identity())).await,
            CalculatorSettings::default()
        );
    }
}

#[tokio::test]
async fn test_settings_fall_back_when_backend_unreachable() {
    // Nothing listens on port 1
    let client = SettingsClient::new(backend("http://127.0.0.1:1".to_string()));
    assert_eq!(
        client.fetch_settings(Some(&identity())).await,
        CalculatorSettings::default()
    );
}

#[tokio::test]
async fn test_settings_fetch_is_idempotent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/calculator/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"settings": remote_settings()}
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = SettingsClient::new(backend(mock_server.uri()));
    let first = client.fetch_settings(Some(&identity())).await;
    let second = client.fetch_settings(Some(&identity())).await;

    assert_eq!(first, second);
    assert_ne!(first, CalculatorSettings::default());
}

#[tokio::test]
async fn test_settings_cache_serves_repeat_reads() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/calculator/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"settings": remote_settings()}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = SettingsClient::with_cache_ttl(backend(mock_server.uri()), Duration::from_secs(60));
    let first = client.fetch_settings(Some(&identity())).await;
    let second = client.fetch_settings(Some(&identity())).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_settings_cache_skips_fallback_documents() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/calculator/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = SettingsClient::with_cache_ttl(backend(mock_server.uri()), Duration::from_secs(60));
    client.fetch_settings(Some(&identity())).await;
    client.fetch_settings(Some(&identity())).await;
}

// ============ Submission ============

#[tokio::test]
async fn test_submission_without_identity_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = SubmissionClient::new(backend(mock_server.uri()));
    let result = client.submit(None, CalculationSubmission::default()).await;

    assert_eq!(result, Err(ClientError::NotRegistered));
}

#[tokio::test]
async fn test_submission_with_blank_app_id_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = SubmissionClient::new(backend(mock_server.uri()));

    for app_id in ["", "   "] {
        let identity = SiteIdentity {
            app_id: app_id.to_string(),
            dashboard_url: "https://x".to_string(),
        };
        let result = client
            .submit(Some(&identity), CalculationSubmission::default())
            .await;
        assert_eq!(result, Err(ClientError::NotRegistered));
    }
}

#[tokio::test]
async fn test_submission_ignores_app_id_in_extra_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/calculator/ch7"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "data": {"id": 78}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut record = CalculationSubmission {
        email: "ana@example.com".to_string(),
        ..Default::default()
    };
    record.extra.insert("app_id".to_string(), json!("spoofed"));
    record.extra.insert("household_size".to_string(), json!(3));

    let client = SubmissionClient::new(backend(mock_server.uri()));
    client.submit(Some(&identity()), record).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let raw = String::from_utf8(requests[0].body.clone()).unwrap();
    assert_eq!(raw.matches("\"app_id\"").count(), 1);

    let body: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(body["app_id"], "A1");
    assert_eq!(body["household_size"], 3);
}

#[tokio::test]
async fn test_submission_injects_app_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/calculator/ch7"))
        .and(header("X-API-Key", "test_key"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({"app_id": "A1", "email": "ana@example.com"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "data": {"id": 77}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let record = CalculationSubmission {
        first_name: "Ana".to_string(),
        email: "ana@example.com".to_string(),
        annual_income: 48000,
        app_id: Some("spoofed".to_string()),
        ..Default::default()
    };

    let client = SubmissionClient::new(backend(mock_server.uri()));
    let ack = client.submit(Some(&identity()), record).await.unwrap();

    assert_eq!(ack.data, json!({"id": 77}));

    let requests = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["app_id"], "A1");
    assert_eq!(body["anual_income"], 48000);
}

#[tokio::test]
async fn test_submission_failures_are_backend_rejected() {
    let bad_responses = vec![
        ResponseTemplate::new(200).set_body_json(json!({"success": false, "message": "quota"})),
        ResponseTemplate::new(200).set_body_string("oops"),
        ResponseTemplate::new(200).set_body_json(json!({"success": true})),
        ResponseTemplate::new(502).set_body_string("Bad Gateway"),
    ];

    for response in bad_responses {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/calculator/ch7"))
            .respond_with(response)
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = SubmissionClient::new(backend(mock_server.uri()));
        let result = client
            .submit(Some(&identity()), CalculationSubmission::default())
            .await;

        assert_eq!(
            result,
            Err(ClientError::BackendRejected(
                "Failed to submit calculation".to_string()
            ))
        );
    }
}

// ============ Lifecycle ============

#[tokio::test]
async fn test_startup_registers_then_serves_remote_settings() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sites/register"))
        .respond_with(registration_ok())
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/calculator/settings"))
        .and(query_param("app_id", "A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"settings": remote_settings()}
        })))
        .mount(&mock_server)
        .await;

    let store = identities();
    let calculator = Calculator::new(
        backend(mock_server.uri()),
        store.clone(),
        profile(),
        Duration::ZERO,
    );

    assert_eq!(calculator.on_startup().await, Some(identity()));
    // Second startup finds the cached identity
    assert_eq!(calculator.on_startup().await, Some(identity()));

    let settings = calculator.on_render_request().await;
    assert_eq!(settings.debt_ratio_threshold, 0.35);

    let status = calculator.status().await;
    assert!(status.registered);
    assert_eq!(status.dashboard_url.as_deref(), Some("https://x"));

    assert_eq!(
        store.options().get(OPTION_VERSION).await.unwrap().as_deref(),
        Some(env!("CARGO_PKG_VERSION"))
    );
}

#[tokio::test]
async fn test_failed_startup_keeps_calculator_usable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sites/register"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let calculator = Calculator::new(
        backend(mock_server.uri()),
        identities(),
        profile(),
        Duration::ZERO,
    );

    assert_eq!(calculator.on_startup().await, None);
    assert_eq!(
        calculator.on_render_request().await,
        CalculatorSettings::default()
    );
    assert_eq!(
        calculator
            .on_submission_request(CalculationSubmission::default())
            .await,
        Err(ClientError::NotRegistered)
    );
    assert!(!calculator.status().await.registered);
}

#[tokio::test]
async fn test_deactivate_forgets_identity() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sites/register"))
        .respond_with(registration_ok())
        .expect(2)
        .mount(&mock_server)
        .await;

    let store = identities();
    let calculator = Calculator::new(
        backend(mock_server.uri()),
        store.clone(),
        profile(),
        Duration::from_secs(60),
    );

    calculator.on_startup().await;
    calculator.on_deactivate().await.unwrap();

    assert_eq!(store.load().await.unwrap(), None);
    assert_eq!(store.options().get(OPTION_VERSION).await.unwrap(), None);

    // Registering again after deactivation reaches the backend
    assert_eq!(calculator.register_now().await, Ok(identity()));
}
