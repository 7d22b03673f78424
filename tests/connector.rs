//! Full sync through the public entry points

mod common;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wordpress_connect::{Connector, ErrorKind, InventorySource, connect};

async fn mount_site(server: &MockServer) {
    common::mount_rest_probe(server).await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "Admin" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Shop",
            "home": "https://shop.example.com",
            "wp_version": "6.6.1"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn sync_reports_connection_and_inventory() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    Mock::given(method("GET"))
        .and(path("/wp-json/sparklewp/v1/site-info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "plugin_count": 4,
            "theme_count": 2,
            "posts_count": 30
        })))
        .expect(1)
        .mount(&server)
        .await;

    let report = connect(common::app_password_config(&server)).await.unwrap();

    assert!(report.outcome.success);
    assert_eq!(report.outcome.wp_version, "6.6.1");
    let inventory = report.inventory.unwrap();
    assert_eq!(inventory.plugin_count, 4);
    assert_eq!(inventory.post_count, 30);
    assert_eq!(inventory.source, InventorySource::PrivilegedExtension);
}

#[tokio::test]
async fn failed_connection_skips_inventory() {
    let server = MockServer::start().await;
    common::mount_rest_probe(&server).await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/users/me"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-json/sparklewp/v1/site-info"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = Connector::new(common::app_password_config(&server))
        .unwrap()
        .sync()
        .await;

    assert!(!report.outcome.success);
    assert_eq!(
        report.outcome.failure_reason,
        Some(ErrorKind::InsufficientPermissions)
    );
    assert!(report.inventory.is_none());
}

#[tokio::test]
async fn probe_through_connector() {
    let server = MockServer::start().await;
    common::mount_rest_probe(&server).await;

    let connector = Connector::new(common::app_password_config(&server)).unwrap();
    let result = connector.probe().await.unwrap();

    assert!(result.is_wordpress);
    assert_eq!(connector.config().target_url(), server.uri());
}
