//! Connection test flow against a mock WordPress site

mod common;

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wordpress_connect::{
    AuthMethod, CancellationToken, ConnectionConfig, ConnectionTester, Connector, ErrorKind,
};

async fn mount_identity(server: &MockServer, status: u16, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/users/me"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_discovery(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/wp-json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn valid_application_password_connects() {
    let server = MockServer::start().await;
    common::mount_rest_probe(&server).await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/users/me"))
        .and(header("authorization", common::BASIC_AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "name": "Site Admin",
            "slug": "admin"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_discovery(
        &server,
        json!({
            "name": "My Blog",
            "description": "Just another WordPress site",
            "url": "https://blog.example.com",
            "home": "https://blog.example.com",
            "gmt_offset": "2",
            "wp_version": "6.4.1"
        }),
    )
    .await;
    // Version comes from the discovery document, so no markup fetch
    common::forbid_homepage(&server).await;

    let config = common::app_password_config(&server);
    let transport = common::transport();
    let outcome = ConnectionTester::new(&config, &transport)
        .test_connection()
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.site_name, "My Blog");
    assert_eq!(outcome.site_description, "Just another WordPress site");
    assert_eq!(outcome.wp_version, "6.4.1");
    assert_eq!(outcome.canonical_site_url, "https://blog.example.com");
    assert_eq!(outcome.gmt_offset, 2.0);
    assert_eq!(outcome.authenticated_user.as_deref(), Some("Site Admin"));
    assert_eq!(outcome.failure_reason, None);
}

#[tokio::test]
async fn missing_discovery_fields_fall_back_to_defaults() {
    let server = MockServer::start().await;
    common::mount_rest_probe(&server).await;
    mount_identity(&server, 200, json!({ "slug": "admin" })).await;
    mount_discovery(&server, json!({ "wp_version": "6.2" })).await;

    let config = common::app_password_config(&server);
    let transport = common::transport();
    let outcome = ConnectionTester::new(&config, &transport)
        .test_connection()
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.site_name, "Unknown");
    assert_eq!(outcome.site_description, "");
    assert_eq!(outcome.canonical_site_url, server.uri());
    assert_eq!(outcome.gmt_offset, 0.0);
    assert_eq!(outcome.authenticated_user.as_deref(), Some("admin"));
}

#[tokio::test]
async fn version_from_home_page_fetched_once() {
    let server = MockServer::start().await;
    common::mount_rest_probe(&server).await;
    mount_identity(&server, 200, json!({ "name": "Admin" })).await;
    Mock::given(method("GET"))
        .and(path("/wp-json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Blog",
            "gmt_offset": 0,
            "timezone_string": ""
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head>
                <script src="/wp-includes/js/wp-emoji-release.min.js?ver=6.5.3"></script>
            </head></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = common::app_password_config(&server);
    let transport = common::transport();
    let outcome = ConnectionTester::new(&config, &transport)
        .test_connection()
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.wp_version, "6.5.3");
}

#[tokio::test]
async fn asset_frequency_is_the_last_resort() {
    let server = MockServer::start().await;
    common::mount_rest_probe(&server).await;
    mount_identity(&server, 200, json!({ "name": "Admin" })).await;
    mount_discovery(&server, json!({ "name": "Blog" })).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<link href="/wp-content/themes/x/style.css?ver=6.2.3">
               <script src="/wp-content/themes/x/app.js?ver=6.2.3"></script>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = common::app_password_config(&server);
    let transport = common::transport();
    let outcome = ConnectionTester::new(&config, &transport)
        .test_connection()
        .await;

    assert_eq!(outcome.wp_version, "6.2.3");
}

#[tokio::test]
async fn undetectable_version_is_unknown() {
    let server = MockServer::start().await;
    common::mount_rest_probe(&server).await;
    mount_identity(&server, 200, json!({ "name": "Admin" })).await;
    mount_discovery(&server, json!({ "name": "Blog" })).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = common::app_password_config(&server);
    let transport = common::transport();
    let outcome = ConnectionTester::new(&config, &transport)
        .test_connection()
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.wp_version, "Unknown");
}

#[tokio::test]
async fn rejected_password_still_checks_rest_api() {
    let server = MockServer::start().await;
    // Liveness check plus one unauthenticated diagnostic request
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;
    mount_identity(
        &server,
        401,
        json!({ "code": "incorrect_password", "message": "The password is incorrect." }),
    )
    .await;

    let config = common::app_password_config(&server);
    let transport = common::transport();
    let outcome = ConnectionTester::new(&config, &transport)
        .test_connection()
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure_reason, Some(ErrorKind::AuthenticationFailed));
    assert!(
        outcome
            .failure_message
            .unwrap()
            .contains("invalid username or application password")
    );
}

#[tokio::test]
async fn generic_unauthorized_checks_rest_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;
    mount_identity(&server, 401, json!({ "code": "rest_not_logged_in" })).await;

    let config = common::app_password_config(&server);
    let transport = common::transport();
    let outcome = ConnectionTester::new(&config, &transport)
        .test_connection()
        .await;

    assert_eq!(outcome.failure_reason, Some(ErrorKind::AuthenticationFailed));
    assert!(
        outcome
            .failure_message
            .unwrap()
            .contains("REST API is reachable")
    );
}

#[tokio::test]
async fn identity_status_mapping() {
    for (status, expected) in [
        (403, ErrorKind::InsufficientPermissions),
        (404, ErrorKind::ApiUnavailable),
        (500, ErrorKind::RemoteServerError),
        (503, ErrorKind::RemoteServerError),
    ] {
        let server = MockServer::start().await;
        common::mount_rest_probe(&server).await;
        mount_identity(&server, status, json!({})).await;

        let config = common::app_password_config(&server);
        let transport = common::transport();
        let outcome = ConnectionTester::new(&config, &transport)
            .test_connection()
            .await;

        assert!(!outcome.success, "status {}", status);
        assert_eq!(outcome.failure_reason, Some(expected), "status {}", status);
        assert_eq!(outcome.wp_version, "Unknown");
    }
}

#[tokio::test]
async fn non_wordpress_site_fails_before_authenticating() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>plain</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/users/me"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = common::app_password_config(&server);
    let transport = common::transport();
    let outcome = ConnectionTester::new(&config, &transport)
        .test_connection()
        .await;

    assert_eq!(outcome.failure_reason, Some(ErrorKind::NotWordPress));
}

#[tokio::test]
async fn missing_api_key_is_invalid_credentials() {
    let server = MockServer::start().await;
    common::mount_rest_probe(&server).await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/users/me"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = ConnectionConfig::builder(&server.uri())
        .method(AuthMethod::ApiKey)
        .allow_private(true)
        .build()
        .unwrap();
    let transport = common::transport();
    let outcome = ConnectionTester::new(&config, &transport)
        .test_connection()
        .await;

    assert_eq!(outcome.failure_reason, Some(ErrorKind::InvalidCredentials));
}

#[tokio::test]
async fn api_key_header_reaches_the_site() {
    let server = MockServer::start().await;
    common::mount_rest_probe(&server).await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/users/me"))
        .and(header("x-api-key", "K123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "Bot" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_discovery(&server, json!({ "name": "Blog", "wp_version": "6.6" })).await;

    let config = ConnectionConfig::builder(&server.uri())
        .method(AuthMethod::ApiKey)
        .secret("K123")
        .allow_private(true)
        .build()
        .unwrap();
    let transport = common::transport();
    let outcome = ConnectionTester::new(&config, &transport)
        .test_connection()
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.authenticated_user.as_deref(), Some("Bot"));
}

#[tokio::test]
async fn cancellation_aborts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let connector = Connector::new(common::app_password_config(&server))
        .unwrap()
        .with_cancellation(token.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });
    let report = connector.sync().await;
    trigger.await.unwrap();

    assert_eq!(report.outcome.failure_reason, Some(ErrorKind::Cancelled));
    assert!(report.inventory.is_none());
}
