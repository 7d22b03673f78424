//! WordPress detection for a bare site URL

use crate::auth::AuthHeaders;
use crate::error::Result;
use crate::transport::Transport;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::debug;

/// REST API discovery path used as the liveness probe
pub const REST_DISCOVERY_PATH: &str = "/wp-json/wp/v2/";

/// Markup fragments that only WordPress sites carry
const WP_MARKUP_FRAGMENTS: &[&str] = &["wp-content", "wp-includes", "wordpress"];

/// WordPress cookie prefixes
const WP_COOKIE_PREFIXES: &[&str] = &["wordpress_", "wp-"];
const WP_LANG_COOKIE: &str = "wp_lang";

/// How the probe reached its verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// REST discovery endpoint answered
    RestApi,
    /// Home page markup or cookies were inspected
    HtmlFingerprint,
}

/// Verdict of a single probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteProbeResult {
    pub is_wordpress: bool,
    pub rest_api_available: bool,
    /// Status of the REST discovery request
    pub http_status: Option<u16>,
    pub detection_method: DetectionMethod,
}

/// Decides whether a URL hosts WordPress
#[derive(Debug)]
pub struct SiteProbe<'a> {
    transport: &'a Transport,
}

impl<'a> SiteProbe<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    /// Probe the site at `base_url` (normalized, no trailing slash)
    ///
    /// Only transport failures are errors; an answer that does not look like
    /// WordPress is reported through `is_wordpress`.
    pub async fn probe(&self, base_url: &str) -> Result<SiteProbeResult> {
        let discovery_url = format!("{}{}", base_url, REST_DISCOVERY_PATH);
        let discovery = self
            .transport
            .get(&discovery_url, Some(&AuthHeaders::anonymous()))
            .await?;
        let status = discovery.status.as_u16();

        if (200..500).contains(&status) && status != 404 {
            return Ok(SiteProbeResult {
                is_wordpress: true,
                rest_api_available: status == 200,
                http_status: Some(status),
                detection_method: DetectionMethod::RestApi,
            });
        }

        debug!(
            url = base_url,
            status, "REST discovery unavailable, checking home page markup"
        );

        let home = self.transport.get(base_url, None).await?;
        let is_wordpress = home.is_success()
            && (has_wordpress_markup(&home.body) || has_wordpress_cookie(&home.cookies));

        Ok(SiteProbeResult {
            is_wordpress,
            rest_api_available: false,
            http_status: Some(status),
            detection_method: DetectionMethod::HtmlFingerprint,
        })
    }
}

/// Look for WordPress path fragments or the REST API discovery link
pub(crate) fn has_wordpress_markup(html: &str) -> bool {
    let content = html.to_lowercase();
    if WP_MARKUP_FRAGMENTS.iter().any(|f| content.contains(f)) {
        return true;
    }

    let document = Html::parse_document(html);
    Selector::parse(r#"link[rel="https://api.w.org/"]"#)
        .map(|selector| document.select(&selector).next().is_some())
        .unwrap_or(false)
}

fn has_wordpress_cookie(cookies: &[String]) -> bool {
    cookies.iter().any(|name| {
        WP_COOKIE_PREFIXES.iter().any(|p| name.starts_with(p)) || name == WP_LANG_COOKIE
    })
}
