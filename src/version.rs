//! WordPress core version detection
//!
//! Tries, in order: version fields in the discovery document, a second
//! discovery fetch, asset and generator patterns in the home page, and
//! finally the most frequent `?ver=` value in that page. The last step is a
//! heuristic: plugins pinned to the same version string as core can skew it.

use crate::auth::AuthHeaders;
use crate::cascade::Cascade;
use crate::connection::{ROOT_DISCOVERY_PATH, SiteInfo, UNKNOWN_VERSION};
use crate::error::{Error, Result};
use crate::transport::Transport;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tokio::sync::OnceCell;
use tracing::debug;

/// Version capture shared by every pattern: X.Y or X.Y.Z
macro_rules! version_pattern {
    ($prefix:literal) => {
        concat!($prefix, r"([0-9]+\.[0-9]+(?:\.[0-9]+)?)")
    };
}

/// Asset patterns, strongest signal first
static ASSET_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        (
            "emoji-release",
            version_pattern!(r"wp-emoji-release\.min\.js\?ver="),
        ),
        (
            "core-script",
            version_pattern!(r"wp-(?:includes|admin|content)/js/[^/]+\.js\?ver="),
        ),
        (
            "core-style",
            version_pattern!(r"wp-(?:includes|admin|content)/css/[^/]+\.css\?ver="),
        ),
        (
            "wp-asset",
            version_pattern!(r#"['"/]wp-[^'"/]*\.(?:js|css)\?ver="#),
        ),
        (
            "wp-includes",
            version_pattern!(r#"wp-includes/[^'"]*\?ver="#),
        ),
    ]
    .into_iter()
    .map(|(label, pattern)| (label, Regex::new(pattern).expect("asset pattern is valid")))
    .collect()
});

static GENERATOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(version_pattern!(
        r#"(?i)<meta name="generator" content="WordPress "#
    ))
    .expect("generator pattern is valid")
});

static MENTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(version_pattern!(r"WordPress ")).expect("mention pattern is valid")
});

static VER_QUERY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(version_pattern!(r"\?ver=")).expect("ver query pattern is valid")
});

static LEADING_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(version_pattern!("^")).expect("leading version pattern is valid")
});

/// Extracts the core version of a connected site
#[derive(Debug)]
pub struct VersionDetector<'a> {
    base_url: &'a str,
    transport: &'a Transport,
}

impl<'a> VersionDetector<'a> {
    pub fn new(base_url: &'a str, transport: &'a Transport) -> Self {
        Self {
            base_url,
            transport,
        }
    }

    /// Best-effort version; [`UNKNOWN_VERSION`] when every step comes up empty
    pub async fn detect(&self, site: &SiteInfo) -> String {
        // Fetched at most once, shared by the markup steps
        let homepage = OnceCell::new_with(site.markup().map(str::to_string));

        let detected = Cascade::new("wp-version")
            .step(
                "discovery-fields",
                std::future::ready(Ok(version_from_fields(site))),
            )
            .step("discovery-refetch", self.from_refetched_discovery())
            .step("markup-patterns", self.from_markup_patterns(&homepage))
            .step("asset-frequency", self.from_asset_frequency(&homepage))
            .run()
            .await;

        match detected {
            Some((step, version)) => {
                debug!(url = self.base_url, step, %version, "WordPress version detected");
                version
            }
            None => UNKNOWN_VERSION.to_string(),
        }
    }

    /// Re-read the discovery document and trust `wp_version` only when the
    /// document has the standard timezone fields
    async fn from_refetched_discovery(&self) -> Result<Option<String>> {
        let url = format!("{}{}", self.base_url, ROOT_DISCOVERY_PATH);
        let reply = self
            .transport
            .get(&url, Some(&AuthHeaders::anonymous()))
            .await?;
        if reply.status.as_u16() != 200 {
            return Ok(None);
        }

        let site = SiteInfo::from_reply(&reply);
        if !site.has_field("gmt_offset") && !site.has_field("timezone_string") {
            return Ok(None);
        }
        Ok(site.text("wp_version"))
    }

    async fn from_markup_patterns(&self, homepage: &OnceCell<String>) -> Result<Option<String>> {
        let html = self.homepage(homepage).await?;
        Ok(version_from_markup(html))
    }

    async fn from_asset_frequency(&self, homepage: &OnceCell<String>) -> Result<Option<String>> {
        let html = self.homepage(homepage).await?;
        Ok(most_common_asset_version(html))
    }

    async fn homepage<'c>(&self, cell: &'c OnceCell<String>) -> Result<&'c str> {
        let html = cell.get_or_try_init(|| self.fetch_homepage()).await?;
        Ok(html.as_str())
    }

    async fn fetch_homepage(&self) -> Result<String> {
        let reply = self.transport.get(self.base_url, None).await?;
        if !reply.is_success() {
            return Err(Error::HttpStatus(reply.status.as_u16()));
        }
        Ok(reply.body)
    }
}

/// `wp_version`, then `version`, then `api_version`
pub(crate) fn version_from_fields(site: &SiteInfo) -> Option<String> {
    site.text("wp_version")
        .or_else(|| site.text("version"))
        .or_else(|| site.text("api_version").map(|v| format!("API v{}", v)))
}

/// First matching pattern wins
pub(crate) fn version_from_markup(html: &str) -> Option<String> {
    for (label, pattern) in ASSET_PATTERNS.iter() {
        if let Some(version) = first_capture(pattern, html) {
            debug!(pattern = label, %version, "asset pattern matched");
            return Some(version);
        }
    }

    version_from_generator(html)
        .or_else(|| first_capture(&GENERATOR_PATTERN, html))
        .or_else(|| first_capture(&MENTION_PATTERN, html))
}

/// Version from the `<meta name="generator">` tag, in any attribute order
fn version_from_generator(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("meta[name='generator']").ok()?;

    document.select(&selector).find_map(|element| {
        let content = element.value().attr("content")?;
        let version = content.trim().strip_prefix("WordPress ")?.trim();
        LEADING_VERSION
            .captures(version)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Most frequent `?ver=` value; ties go to the one seen first
pub(crate) fn most_common_asset_version(html: &str) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for caps in VER_QUERY_PATTERN.captures_iter(html) {
        let Some(version) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        match counts.iter_mut().find(|(seen, _)| *seen == version) {
            Some((_, count)) => *count += 1,
            None => counts.push((version, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (version, count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((version, count));
        }
    }
    best.map(|(version, _)| version.to_string())
}

fn first_capture(pattern: &Regex, html: &str) -> Option<String> {
    pattern
        .captures(html)?
        .get(1)
        .map(|m| m.as_str().to_string())
}
