//! HTTP transport shared by every remote call
//!
//! One reqwest client with a fixed per-call timeout. Failures are classified
//! into timeout, unreachable, and other request errors, and every call races
//! the caller's cancellation token.

use crate::auth::{AuthHeaders, USER_AGENT};
use crate::error::{Error, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fully read HTTP response
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Names of cookies set by the response
    pub cookies: Vec<String>,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    /// Header value, if present and printable
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

/// HTTP client used by all probes, tests, and inventory steps
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    cancel: CancellationToken,
}

impl Transport {
    /// Create a transport whose calls each time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .danger_accept_invalid_certs(false)
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            cancel: CancellationToken::new(),
        })
    }

    /// Abort in-flight and future calls once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn get(&self, url: &str, headers: Option<&AuthHeaders>) -> Result<HttpReply> {
        self.send(Method::GET, url, headers).await
    }

    pub async fn head(&self, url: &str, headers: Option<&AuthHeaders>) -> Result<HttpReply> {
        self.send(Method::HEAD, url, headers).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: Option<&AuthHeaders>,
    ) -> Result<HttpReply> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(%method, url, "request cancelled");
                Err(Error::Cancelled)
            }
            reply = self.execute(method.clone(), url, headers) => reply,
        }
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        headers: Option<&AuthHeaders>,
    ) -> Result<HttpReply> {
        let mut request = self.client.request(method.clone(), url);
        if let Some(headers) = headers {
            request = request.headers(headers.header_map().clone());
        }

        let response = request.send().await.map_err(|e| classify(url, e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let cookies = response
            .cookies()
            .map(|cookie| cookie.name().to_string())
            .collect();

        debug!(%method, url, status = status.as_u16(), "remote call completed");

        let body = response.text().await.map_err(|e| classify(url, e))?;

        Ok(HttpReply {
            status,
            headers,
            cookies,
            body,
        })
    }
}

/// Map a reqwest failure to the error kind the caller can act on
fn classify(url: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(url.to_string())
    } else if err.is_connect() {
        Error::SiteUnreachable(format!("{}: {}", url, err))
    } else {
        Error::HttpRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_transport_refuses_calls() {
        let token = CancellationToken::new();
        let transport = Transport::new(Duration::from_secs(1))
            .unwrap()
            .with_cancellation(token.clone());
        token.cancel();

        assert!(transport.is_cancelled());
        let result = tokio_test::block_on(transport.get("http://127.0.0.1:9/", None));
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn reply_decodes_json_and_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-wp-total", "42".parse().unwrap());
        let reply = HttpReply {
            status: StatusCode::OK,
            headers,
            cookies: Vec::new(),
            body: r#"{"name":"Blog"}"#.to_string(),
        };

        assert!(reply.is_success());
        assert_eq!(reply.header("x-wp-total"), Some("42"));
        let value: serde_json::Value = reply.json().unwrap();
        assert_eq!(value["name"], "Blog");
    }

    #[test]
    fn reply_rejects_markup_as_json() {
        let reply = HttpReply {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: "<html></html>".to_string(),
        };
        let err = reply.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }
}
