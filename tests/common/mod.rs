//! Shared fixtures for the mock-server tests

#![allow(dead_code)]

use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wordpress_connect::{AuthMethod, ConnectionConfig, Transport};

/// Application password as WordPress displays it
pub const APP_PASSWORD: &str = "abcd efgh ijkl mnop";

/// `Basic base64("admin:abcdefghijklmnop")`
pub const BASIC_AUTH: &str = "Basic YWRtaW46YWJjZGVmZ2hpamtsbW5vcA==";

/// Application-password config for the mock server
pub fn app_password_config(server: &MockServer) -> ConnectionConfig {
    ConnectionConfig::builder(&server.uri())
        .method(AuthMethod::ApplicationPassword)
        .username("admin")
        .secret(APP_PASSWORD)
        .timeout(Duration::from_secs(5))
        .allow_private(true)
        .build()
        .unwrap()
}

pub fn transport() -> Transport {
    Transport::new(Duration::from_secs(5)).unwrap()
}

/// Answer the REST liveness probe with an empty namespace document
pub async fn mount_rest_probe(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "namespace": "wp/v2",
            "routes": {}
        })))
        .mount(server)
        .await;
}

/// Fail the test if the home page is ever requested
pub async fn forbid_homepage(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}
