//! Credential schemes for authenticating against a remote WordPress site
//!
//! Each [`AuthMethod`] decodes into exactly one [`Credential`] variant, and
//! each variant produces one set of [`AuthHeaders`]. Everything downstream
//! treats the headers as opaque.

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::header::{
    ACCEPT, AUTHORIZATION, COOKIE, HeaderMap, HeaderName, HeaderValue, USER_AGENT as USER_AGENT_HEADER,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User agent sent with every request
pub const USER_AGENT: &str = "SparkleWP/1.0";

/// Header carrying a custom token understood by the companion extension
pub const CUSTOM_TOKEN_HEADER: &str = "x-wp-sparklewp-token";

const API_KEY_HEADER: &str = "x-api-key";
const NONCE_HEADER: &str = "x-wp-nonce";
const SESSION_COOKIE_PREFIX: &str = "wordpress_logged_in_";

/// Authentication method selected for a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// WordPress application password over HTTP Basic
    #[default]
    ApplicationPassword,
    /// JWT bearer token
    JwtToken,
    /// Pre-obtained OAuth access token
    Oauth,
    /// API key header
    ApiKey,
    /// REST nonce from a logged-in browser session
    CookieAuth,
    /// Token understood by the companion extension
    CustomToken,
    /// `sessionId:nonce` pair
    SessionAuth,
}

impl AuthMethod {
    /// All methods, in display order
    pub const ALL: [AuthMethod; 7] = [
        Self::ApplicationPassword,
        Self::JwtToken,
        Self::Oauth,
        Self::ApiKey,
        Self::CookieAuth,
        Self::CustomToken,
        Self::SessionAuth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplicationPassword => "application_password",
            Self::JwtToken => "jwt_token",
            Self::Oauth => "oauth",
            Self::ApiKey => "api_key",
            Self::CookieAuth => "cookie_auth",
            Self::CustomToken => "custom_token",
            Self::SessionAuth => "session_auth",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == normalized)
            .ok_or_else(|| Error::UnsupportedMethod(s.to_string()))
    }
}

/// Request headers produced by a single credential scheme
#[derive(Clone)]
pub struct AuthHeaders(HeaderMap);

impl AuthHeaders {
    /// Identifying headers only, no credential
    pub fn anonymous() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT_HEADER, HeaderValue::from_static(USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Self(headers)
    }

    /// Value of a header, if present and printable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name)?.to_str().ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn header_map(&self) -> &HeaderMap {
        &self.0
    }

    fn insert_secret(&mut self, name: HeaderName, value: &str) -> Result<()> {
        let mut value = HeaderValue::from_str(value).map_err(|_| {
            Error::InvalidCredentials(format!(
                "value for {} contains characters not allowed in an HTTP header",
                name
            ))
        })?;
        value.set_sensitive(true);
        self.0.insert(name, value);
        Ok(())
    }
}

impl fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // HeaderValue's Debug already prints "Sensitive" for marked values
        f.debug_map().entries(self.0.iter()).finish()
    }
}

/// Credential decoded from a connection config
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    ApplicationPassword { username: String, password: String },
    Bearer(String),
    ApiKey(String),
    Nonce(String),
    CustomToken(String),
    Session { session_id: String, nonce: String, token: String },
}

impl Credential {
    /// Decode the credential required by the config's method
    ///
    /// Fails with [`Error::InvalidCredentials`] when a required field is
    /// missing or blank.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        let method = config.method();
        let secret = || {
            non_blank(config.secret())
                .ok_or_else(|| Error::InvalidCredentials(format!("{} requires a secret", method)))
        };

        match method {
            AuthMethod::ApplicationPassword => {
                let username = non_blank(config.username()).ok_or_else(|| {
                    Error::InvalidCredentials(
                        "username and application password are required".to_string(),
                    )
                })?;
                let password = secret()?.split_whitespace().collect::<String>();
                Ok(Self::ApplicationPassword {
                    username: username.to_string(),
                    password,
                })
            }
            AuthMethod::JwtToken | AuthMethod::Oauth => Ok(Self::Bearer(secret()?.to_string())),
            AuthMethod::ApiKey => Ok(Self::ApiKey(secret()?.to_string())),
            AuthMethod::CookieAuth => Ok(Self::Nonce(secret()?.to_string())),
            AuthMethod::CustomToken => Ok(Self::CustomToken(secret()?.to_string())),
            AuthMethod::SessionAuth => {
                let token = secret()?;
                let (session_id, nonce) = token
                    .split_once(':')
                    .filter(|(session_id, nonce)| !session_id.is_empty() && !nonce.is_empty())
                    .ok_or_else(|| {
                        Error::InvalidCredentials(
                            "session token must have the form sessionId:nonce".to_string(),
                        )
                    })?;
                Ok(Self::Session {
                    session_id: session_id.to_string(),
                    nonce: nonce.to_string(),
                    token: token.to_string(),
                })
            }
        }
    }

    /// Headers carrying this credential
    pub fn headers(&self) -> Result<AuthHeaders> {
        let mut headers = AuthHeaders::anonymous();
        match self {
            Self::ApplicationPassword { username, password } => {
                let encoded = STANDARD.encode(format!("{}:{}", username, password));
                headers.insert_secret(AUTHORIZATION, &format!("Basic {}", encoded))?;
            }
            Self::Bearer(token) => {
                headers.insert_secret(AUTHORIZATION, &format!("Bearer {}", token))?;
            }
            Self::ApiKey(key) => {
                headers.insert_secret(HeaderName::from_static(API_KEY_HEADER), key)?;
            }
            Self::Nonce(nonce) => {
                headers.insert_secret(HeaderName::from_static(NONCE_HEADER), nonce)?;
            }
            Self::CustomToken(token) => {
                headers.insert_secret(HeaderName::from_static(CUSTOM_TOKEN_HEADER), token)?;
            }
            Self::Session {
                session_id,
                nonce,
                token,
            } => {
                let cookie = format!("{}{}={}", SESSION_COOKIE_PREFIX, session_id, token);
                headers.insert_secret(COOKIE, &cookie)?;
                headers.insert_secret(HeaderName::from_static(NONCE_HEADER), nonce)?;
            }
        }
        Ok(headers)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApplicationPassword { username, .. } => f
                .debug_struct("ApplicationPassword")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Bearer(_) => f.write_str("Bearer(..)"),
            Self::ApiKey(_) => f.write_str("ApiKey(..)"),
            Self::Nonce(_) => f.write_str("Nonce(..)"),
            Self::CustomToken(_) => f.write_str("CustomToken(..)"),
            Self::Session { .. } => f.write_str("Session(..)"),
        }
    }
}

/// Build the request headers for a connection config
///
/// Pure: no network call is made, so credential problems are reported
/// before any request leaves the process.
pub fn build_headers(config: &ConnectionConfig) -> Result<AuthHeaders> {
    Credential::from_config(config)?.headers()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
