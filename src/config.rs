//! Connection settings for a remote WordPress site

use crate::auth::AuthMethod;
use crate::error::{Error, Result};
use std::fmt;
use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;
use url::Url;

/// Per-call timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Allowed URL schemes
const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Everything needed to reach and authenticate against one site
///
/// Built once through [`ConnectionConfig::builder`] and only ever read
/// afterwards. How `secret` is interpreted depends entirely on `method`.
#[derive(Clone)]
pub struct ConnectionConfig {
    target_url: String,
    method: AuthMethod,
    username: Option<String>,
    secret: Option<String>,
    timeout: Duration,
}

impl ConnectionConfig {
    /// Create a builder for the given URL or domain
    ///
    /// # Example
    ///
    /// ```no_run
    /// use wordpress_connect::{AuthMethod, ConnectionConfig};
    ///
    /// let config = ConnectionConfig::builder("blog.example.com")
    ///     .method(AuthMethod::ApplicationPassword)
    ///     .username("admin")
    ///     .secret("abcd efgh ijkl mnop")
    ///     .build()?;
    /// assert_eq!(config.target_url(), "https://blog.example.com");
    /// # Ok::<(), wordpress_connect::Error>(())
    /// ```
    pub fn builder(url: &str) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(url)
    }

    /// Normalized site URL: scheme-prefixed, without trailing slash
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn method(&self) -> AuthMethod {
        self.method
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URL for a path on the target site
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.target_url, path)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("target_url", &self.target_url)
            .field("method", &self.method)
            .field("username", &self.username)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for a [`ConnectionConfig`]
#[derive(Debug)]
pub struct ConnectionConfigBuilder {
    url: String,
    method: AuthMethod,
    username: Option<String>,
    secret: Option<String>,
    timeout: Duration,
    allow_private: bool,
}

impl ConnectionConfigBuilder {
    /// Create a new builder for the given URL or domain
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: AuthMethod::default(),
            username: None,
            secret: None,
            timeout: DEFAULT_TIMEOUT,
            allow_private: false,
        }
    }

    pub fn method(mut self, method: AuthMethod) -> Self {
        self.method = method;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Password, token, key, or nonce, depending on the method
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Allow connecting to private/internal IP addresses (localhost, 192.168.x.x, etc.)
    ///
    /// Internal networks are rejected by default. Enable this to manage
    /// WordPress installations on a local network.
    pub fn allow_private(mut self, allow: bool) -> Self {
        self.allow_private = allow;
        self
    }

    /// Validate the URL and build the config
    pub fn build(self) -> Result<ConnectionConfig> {
        let target_url = normalize_url(&self.url, self.allow_private)?;
        Ok(ConnectionConfig {
            target_url,
            method: self.method,
            username: self.username,
            secret: self.secret,
            timeout: self.timeout,
        })
    }
}

/// Prefix a scheme when missing, validate, and strip the trailing slash
fn normalize_url(url: &str, allow_private: bool) -> Result<String> {
    let url = url.trim();
    let url_with_scheme = if !url.contains("://") {
        format!("https://{}", url)
    } else {
        url.to_string()
    };

    let mut parsed = Url::parse(&url_with_scheme).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return Err(Error::InvalidUrl(format!(
            "scheme '{}' not allowed (use http or https)",
            parsed.scheme()
        )));
    }

    if !allow_private {
        validate_host(&parsed)?;
    }

    parsed.set_query(None);
    parsed.set_fragment(None);

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Reject hosts that resolve to internal/private addresses
fn validate_host(url: &Url) -> Result<()> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidUrl("missing host".to_string()))?;

    if host == "localhost" || host.ends_with(".localhost") {
        return Err(Error::InvalidUrl("localhost not allowed".to_string()));
    }

    let port = url.port_or_known_default().unwrap_or(443);
    let host = host.trim_start_matches('[').trim_end_matches(']');

    // Unresolvable hosts pass here and surface later as SiteUnreachable
    if let Ok(addrs) = (host, port).to_socket_addrs() {
        for addr in addrs {
            if is_internal_ip(addr.ip()) {
                return Err(Error::InvalidUrl(format!(
                    "internal/private IP address not allowed: {}",
                    addr.ip()
                )));
            }
        }
    }

    Ok(())
}

/// Loopback, RFC 1918, link-local, shared, metadata, and unique-local ranges
fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                || (octets[0] == 100 && (64..=127).contains(&octets[1]))
                || octets[..2] == [192, 0]
        }
        IpAddr::V6(ipv6) => {
            let first = ipv6.segments()[0];
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
        }
    }
}
