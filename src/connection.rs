//! Authenticated connection test against a remote WordPress site

use crate::auth::{AuthHeaders, build_headers};
use crate::config::ConnectionConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::probe::{REST_DISCOVERY_PATH, SiteProbe};
use crate::transport::{HttpReply, Transport};
use crate::version::VersionDetector;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Identity endpoint used to verify credentials
pub const CURRENT_USER_PATH: &str = "/wp-json/wp/v2/users/me";

/// Root REST discovery document
pub const ROOT_DISCOVERY_PATH: &str = "/wp-json/";

/// Version reported when no detection step succeeds
pub const UNKNOWN_VERSION: &str = "Unknown";

const UNKNOWN_SITE_NAME: &str = "Unknown";

/// WordPress error codes that pin a 401 on the credentials themselves
const CREDENTIAL_ERROR_CODES: &[&str] = &["incorrect_password", "invalid_username"];

/// Result of one connection test
///
/// This is what the caller persists and shows; `failure_message` is meant to
/// be surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionOutcome {
    pub success: bool,
    pub site_name: String,
    pub site_description: String,
    pub wp_version: String,
    pub canonical_site_url: String,
    pub gmt_offset: f64,
    /// Display name of the authenticated user
    pub authenticated_user: Option<String>,
    pub failure_reason: Option<ErrorKind>,
    pub failure_message: Option<String>,
}

impl ConnectionOutcome {
    fn failed(config: &ConnectionConfig, err: &Error) -> Self {
        Self {
            success: false,
            site_name: String::new(),
            site_description: String::new(),
            wp_version: UNKNOWN_VERSION.to_string(),
            canonical_site_url: config.target_url().to_string(),
            gmt_offset: 0.0,
            authenticated_user: None,
            failure_reason: err.kind(),
            failure_message: Some(err.to_string()),
        }
    }
}

/// Root discovery document of the REST API
///
/// Sites with a non-standard setup sometimes answer the discovery path with
/// markup; that body is kept so version detection can fingerprint it.
#[derive(Debug, Clone, Default)]
pub struct SiteInfo {
    document: Map<String, Value>,
    markup: Option<String>,
}

impl SiteInfo {
    pub fn from_document(document: Map<String, Value>) -> Self {
        Self {
            document,
            markup: None,
        }
    }

    pub fn from_reply(reply: &HttpReply) -> Self {
        match serde_json::from_str::<Value>(&reply.body) {
            Ok(Value::Object(document)) => Self::from_document(document),
            _ => Self {
                document: Map::new(),
                markup: Some(reply.body.clone()).filter(|body| !body.trim().is_empty()),
            },
        }
    }

    /// Non-empty string or numeric field as text
    pub fn text(&self, key: &str) -> Option<String> {
        match self.document.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.document.contains_key(key)
    }

    /// Raw body when the discovery path did not answer with JSON
    pub fn markup(&self) -> Option<&str> {
        self.markup.as_deref()
    }

    pub fn name(&self) -> Option<String> {
        self.text("name")
    }

    pub fn description(&self) -> Option<String> {
        self.text("description")
    }

    pub fn home_url(&self) -> Option<String> {
        self.text("home").or_else(|| self.text("url"))
    }

    /// Offset in hours; WordPress sends either a number or a numeric string
    pub fn gmt_offset(&self) -> Option<f64> {
        match self.document.get("gmt_offset")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Subset of the `users/me` response
#[derive(Debug, Deserialize)]
struct CurrentUser {
    name: Option<String>,
    slug: Option<String>,
}

/// Probes, authenticates, and reads site metadata
#[derive(Debug)]
pub struct ConnectionTester<'a> {
    config: &'a ConnectionConfig,
    transport: &'a Transport,
}

impl<'a> ConnectionTester<'a> {
    pub fn new(config: &'a ConnectionConfig, transport: &'a Transport) -> Self {
        Self { config, transport }
    }

    /// Run the full connection test
    ///
    /// Never panics or returns early with an error: every failure becomes a
    /// `ConnectionOutcome` with `success == false` and a failure reason.
    pub async fn test_connection(&self) -> ConnectionOutcome {
        info!(
            url = self.config.target_url(),
            method = %self.config.method(),
            "testing WordPress connection"
        );

        match self.run().await {
            Ok(outcome) => {
                info!(
                    url = self.config.target_url(),
                    wp_version = %outcome.wp_version,
                    "connection test succeeded"
                );
                outcome
            }
            Err(err) => {
                warn!(
                    url = self.config.target_url(),
                    reason = ?err.kind(),
                    error = %err,
                    "connection test failed"
                );
                ConnectionOutcome::failed(self.config, &err)
            }
        }
    }

    async fn run(&self) -> Result<ConnectionOutcome> {
        let probe = SiteProbe::new(self.transport)
            .probe(self.config.target_url())
            .await?;
        if !probe.is_wordpress {
            return Err(Error::NotWordPress);
        }

        let headers = build_headers(self.config)?;
        let identity = self
            .transport
            .get(&self.config.endpoint(CURRENT_USER_PATH), Some(&headers))
            .await?;
        self.check_identity_status(&identity).await?;

        let authenticated_user = identity
            .json::<CurrentUser>()
            .ok()
            .and_then(|user| user.name.or(user.slug));

        let discovery = self
            .transport
            .get(
                &self.config.endpoint(ROOT_DISCOVERY_PATH),
                Some(&AuthHeaders::anonymous()),
            )
            .await?;
        if discovery.status.is_server_error() {
            return Err(Error::RemoteServerError(discovery.status.as_u16()));
        }
        let site = SiteInfo::from_reply(&discovery);

        let wp_version = VersionDetector::new(self.config.target_url(), self.transport)
            .detect(&site)
            .await;

        Ok(ConnectionOutcome {
            success: true,
            site_name: site.name().unwrap_or_else(|| UNKNOWN_SITE_NAME.to_string()),
            site_description: site.description().unwrap_or_default(),
            wp_version,
            canonical_site_url: site
                .home_url()
                .unwrap_or_else(|| self.config.target_url().to_string()),
            gmt_offset: site.gmt_offset().unwrap_or(0.0),
            authenticated_user,
            failure_reason: None,
            failure_message: None,
        })
    }

    /// Map the identity response status to success or a failure kind
    async fn check_identity_status(&self, reply: &HttpReply) -> Result<()> {
        match reply.status.as_u16() {
            200 => Ok(()),
            401 => Err(self.diagnose_unauthorized(reply).await),
            403 => Err(Error::InsufficientPermissions(
                "the user account may be disabled or lack sufficient permissions".to_string(),
            )),
            404 => Err(Error::ApiUnavailable(
                "the users/me endpoint was not found; the REST API may be disabled or blocked"
                    .to_string(),
            )),
            status if status >= 500 => Err(Error::RemoteServerError(status)),
            status => Err(Error::ApiUnavailable(format!(
                "unexpected HTTP status {} from the users/me endpoint",
                status
            ))),
        }
    }

    /// Tell rejected credentials apart from a broken API
    ///
    /// Issues one unauthenticated request to the REST discovery endpoint.
    /// Whatever that request returns, the result is an authentication failure.
    async fn diagnose_unauthorized(&self, reply: &HttpReply) -> Error {
        let code = reply
            .json::<Value>()
            .ok()
            .and_then(|body| body.get("code")?.as_str().map(str::to_string));

        let rejected_credentials = code
            .as_deref()
            .is_some_and(|code| CREDENTIAL_ERROR_CODES.contains(&code));

        let base_api = self
            .transport
            .get(
                &self.config.endpoint(REST_DISCOVERY_PATH),
                Some(&AuthHeaders::anonymous()),
            )
            .await;

        let message = match base_api {
            _ if rejected_credentials => {
                "invalid username or application password, please check your credentials"
                    .to_string()
            }
            Ok(base) if base.status.as_u16() == 200 => {
                "credentials were rejected while the REST API is reachable; verify the username, \
                 that the credential is valid and active, and that the user has sufficient permissions"
                    .to_string()
            }
            Ok(base) => format!(
                "credentials were rejected and the REST API itself answered with status {}",
                base.status.as_u16()
            ),
            Err(err) => {
                debug!(error = %err, "diagnostic request to the REST API failed");
                "credentials were rejected; the REST API could not be checked".to_string()
            }
        };

        Error::AuthenticationFailed(message)
    }
}
