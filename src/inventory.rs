//! Plugin, theme, and post inventory of a connected site
//!
//! The companion extension answers everything in one call. Without it, each
//! resource is gathered on its own from the standard REST API. Plugins
//! additionally come from the WooCommerce status report and home page markup.
//! Nothing here returns an error: a resource that cannot be read counts as
//! zero.

use crate::auth::AuthHeaders;
use crate::cascade::Cascade;
use crate::connection::CURRENT_USER_PATH;
use crate::error::{Error, ErrorKind, Result};
use crate::transport::Transport;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Consolidated endpoint of the companion extension
pub const EXTENSION_SITE_INFO_PATH: &str = "/wp-json/sparklewp/v1/site-info";
pub const POSTS_PATH: &str = "/wp-json/wp/v2/posts";
pub const PLUGINS_PATH: &str = "/wp-json/wp/v2/plugins";
pub const THEMES_PATH: &str = "/wp-json/wp/v2/themes";

/// WooCommerce status report, listing active plugins
pub const WOOCOMMERCE_STATUS_PATH: &str = "/wp-json/wc/v3/system_status";

/// Capabilities that allow reading the plugins endpoint
const PLUGIN_CAPABILITIES: &[&str] = &["manage_plugins", "activate_plugins", "administrator"];

/// Response header carrying a collection's total size
const TOTAL_COUNT_HEADER: &str = "x-wp-total";

/// Path segments under wp-content/plugins that are not plugins
const SKIP_PLUGIN_SLUGS: &[&str] = &["index.php", "index", "cache"];

static PLUGIN_PATH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"wp-content/plugins/([^/'"?\s]+)"#).expect("plugin path pattern is valid")
});

/// Where inventory data came from, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InventorySource {
    /// Nothing could be read
    Unavailable,
    /// Scraped from home page markup
    HtmlFingerprint,
    /// Standard WordPress REST API
    StandardRestApi,
    /// Companion extension endpoint
    PrivilegedExtension,
}

/// Installed plugin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginInfo {
    #[serde(deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(deserialize_with = "nullable_string")]
    pub version: String,
    #[serde(deserialize_with = "nullable_string")]
    pub description: String,
    #[serde(deserialize_with = "nullable_string")]
    pub author: String,
    pub active: bool,
    pub update_available: bool,
    pub latest_version: Option<String>,
    #[serde(deserialize_with = "nullable_string")]
    pub slug: String,
}

/// Installed theme
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeInfo {
    #[serde(deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(deserialize_with = "nullable_string")]
    pub version: String,
    #[serde(deserialize_with = "nullable_string")]
    pub description: String,
    #[serde(deserialize_with = "nullable_string")]
    pub author: String,
    pub active: bool,
    pub update_available: bool,
    pub latest_version: Option<String>,
    #[serde(deserialize_with = "nullable_string")]
    pub slug: String,
}

/// Everything learned about a site's installed content
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventorySnapshot {
    pub plugin_count: u64,
    pub theme_count: u64,
    pub post_count: u64,
    pub detailed_plugins: Option<Vec<PluginInfo>>,
    pub detailed_themes: Option<Vec<ThemeInfo>>,
    pub source: InventorySource,
    /// Core version reported by the extension
    pub wp_version: Option<String>,
    pub php_version: Option<String>,
    /// Set only when the inventory was deliberately withheld
    pub failure_reason: Option<ErrorKind>,
}

impl Default for InventorySnapshot {
    fn default() -> Self {
        Self {
            plugin_count: 0,
            theme_count: 0,
            post_count: 0,
            detailed_plugins: None,
            detailed_themes: None,
            source: InventorySource::Unavailable,
            wp_version: None,
            php_version: None,
            failure_reason: None,
        }
    }
}

impl InventorySnapshot {
    /// Zeroed snapshot explaining why nothing was collected
    pub fn unavailable(reason: Option<ErrorKind>) -> Self {
        Self {
            failure_reason: reason,
            ..Self::default()
        }
    }
}

/// Companion extension `site-info` document
#[derive(Debug, Deserialize)]
struct ExtensionSiteInfo {
    #[serde(default)]
    success: bool,
    #[serde(default, deserialize_with = "lenient_count")]
    plugin_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    theme_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    posts_count: Option<u64>,
    wp_version: Option<String>,
    php_version: Option<String>,
    plugins: Option<Vec<PluginInfo>>,
    themes: Option<Vec<ThemeInfo>>,
}

impl ExtensionSiteInfo {
    fn into_snapshot(self) -> InventorySnapshot {
        let plugins = self.plugins.unwrap_or_default();
        let themes = self.themes.unwrap_or_default();
        InventorySnapshot {
            plugin_count: self.plugin_count.unwrap_or(plugins.len() as u64),
            theme_count: self.theme_count.unwrap_or(themes.len() as u64),
            post_count: self.posts_count.unwrap_or(0),
            detailed_plugins: Some(plugins),
            detailed_themes: Some(themes),
            source: InventorySource::PrivilegedExtension,
            wp_version: self.wp_version,
            php_version: self.php_version,
            failure_reason: None,
        }
    }
}

/// Successful REST collection response
#[derive(Debug)]
struct Listing {
    count: u64,
    items: Vec<Value>,
}

impl Listing {
    /// Arrays count their entries, objects their keys
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(Self {
                count: items.len() as u64,
                items,
            }),
            Value::Object(map) => Some(Self {
                count: map.len() as u64,
                items: Vec::new(),
            }),
            _ => None,
        }
    }
}

/// Collects plugin, theme, and post counts for one site
#[derive(Debug)]
pub struct InventoryAggregator<'a> {
    base_url: &'a str,
    transport: &'a Transport,
}

impl<'a> InventoryAggregator<'a> {
    pub fn new(base_url: &'a str, transport: &'a Transport) -> Self {
        Self {
            base_url,
            transport,
        }
    }

    /// Gather the inventory, never failing
    pub async fn collect(&self, headers: &AuthHeaders) -> InventorySnapshot {
        match self.from_extension(headers).await {
            Ok(Some(snapshot)) => {
                info!(
                    url = self.base_url,
                    plugins = snapshot.plugin_count,
                    themes = snapshot.theme_count,
                    "inventory read from companion extension"
                );
                return snapshot;
            }
            Ok(None) => debug!(url = self.base_url, "companion extension not available"),
            Err(err @ (Error::InsufficientPermissions(_) | Error::Cancelled)) => {
                warn!(url = self.base_url, error = %err, "inventory withheld");
                return InventorySnapshot::unavailable(err.kind());
            }
            Err(err) => warn!(url = self.base_url, error = %err, "companion extension failed"),
        }

        self.from_standard_api(headers).await
    }

    /// `Ok(None)` means the extension is absent or declined, so fall back
    async fn from_extension(&self, headers: &AuthHeaders) -> Result<Option<InventorySnapshot>> {
        let reply = self
            .transport
            .get(&self.endpoint(EXTENSION_SITE_INFO_PATH), Some(headers))
            .await?;

        match reply.status.as_u16() {
            200 => {}
            // Route exists but the user is not an administrator
            403 => {
                return Err(Error::InsufficientPermissions(
                    "the companion extension requires an administrator account".to_string(),
                ));
            }
            status => {
                debug!(status, "companion extension did not answer");
                return Ok(None);
            }
        }

        let info: ExtensionSiteInfo = reply.json()?;
        Ok(info.success.then(|| info.into_snapshot()))
    }

    async fn from_standard_api(&self, headers: &AuthHeaders) -> InventorySnapshot {
        let mut snapshot = InventorySnapshot::default();
        let mut sources: Vec<InventorySource> = Vec::new();

        match self.count_posts(headers).await {
            Ok(Some(count)) => {
                snapshot.post_count = count;
                sources.push(InventorySource::StandardRestApi);
            }
            Ok(None) => debug!("posts count unavailable"),
            Err(err) => debug!(error = %err, "posts count failed"),
        }

        if let Some((count, plugins, source)) = self.collect_plugins(headers).await {
            snapshot.plugin_count = count;
            snapshot.detailed_plugins = plugins;
            sources.push(source);
        }

        if self.transport.is_cancelled() {
            return InventorySnapshot::unavailable(Some(ErrorKind::Cancelled));
        }

        match self.list(THEMES_PATH, Some(headers)).await {
            Ok(Some(listing)) => {
                snapshot.theme_count = listing.count;
                snapshot.detailed_themes = detailed(&listing, theme_from_rest);
                sources.push(InventorySource::StandardRestApi);
            }
            Ok(None) => debug!("themes endpoint gave no listing"),
            Err(err) => debug!(error = %err, "themes listing failed"),
        }

        snapshot.source = sources
            .into_iter()
            .min()
            .unwrap_or(InventorySource::Unavailable);

        info!(
            url = self.base_url,
            source = ?snapshot.source,
            posts = snapshot.post_count,
            plugins = snapshot.plugin_count,
            themes = snapshot.theme_count,
            "inventory collected"
        );
        snapshot
    }

    /// Total from the `X-WP-Total` header of a HEAD request
    async fn count_posts(&self, headers: &AuthHeaders) -> Result<Option<u64>> {
        let reply = self
            .transport
            .head(&self.endpoint(POSTS_PATH), Some(headers))
            .await?;
        if !reply.is_success() {
            return Ok(None);
        }
        Ok(reply
            .header(TOTAL_COUNT_HEADER)
            .and_then(|total| total.trim().parse().ok()))
    }

    /// Count, per-item details, and the source that produced them
    async fn collect_plugins(
        &self,
        headers: &AuthHeaders,
    ) -> Option<(u64, Option<Vec<PluginInfo>>, InventorySource)> {
        let anonymous = AuthHeaders::anonymous();
        let edit_path = format!("{}?context=edit", PLUGINS_PATH);
        let view_path = format!("{}?context=view", PLUGINS_PATH);

        let rest = Cascade::new("plugins")
            .step("edit-context", self.list(&edit_path, Some(headers)))
            .step("view-context", self.list(&view_path, Some(&anonymous)))
            .step("no-context", self.list(PLUGINS_PATH, Some(headers)))
            .step("capability-check", self.check_plugin_capability(headers))
            .step("woocommerce-status", self.woocommerce_plugins(headers))
            .run()
            .await;

        let mut result = rest.map(|(_, listing)| {
            (
                listing.count,
                detailed(&listing, plugin_from_rest),
                InventorySource::StandardRestApi,
            )
        });

        let found = result.as_ref().map_or(0, |(count, _, _)| *count);
        if found == 0 && !self.transport.is_cancelled() {
            match self.scan_plugin_markup().await {
                Ok(slugs) if !slugs.is_empty() => {
                    debug!(plugins = ?slugs, "plugins found in home page markup");
                    result = Some((slugs.len() as u64, None, InventorySource::HtmlFingerprint));
                }
                Ok(_) => debug!("no plugin paths in home page markup"),
                Err(err) => debug!(error = %err, "home page scan for plugins failed"),
            }
        }

        result
    }

    /// Log whether the user may manage plugins; never yields a listing
    async fn check_plugin_capability(&self, headers: &AuthHeaders) -> Result<Option<Listing>> {
        let path = format!("{}?context=edit", CURRENT_USER_PATH);
        let reply = self.transport.get(&self.endpoint(&path), Some(headers)).await?;
        if reply.status.as_u16() != 200 {
            debug!(status = reply.status.as_u16(), "user capabilities unavailable");
            return Ok(None);
        }

        let user: Value = reply.json()?;
        let granted = user.get("capabilities").is_some_and(|caps| {
            PLUGIN_CAPABILITIES
                .iter()
                .any(|cap| caps.get(cap).and_then(Value::as_bool).unwrap_or(false))
        });
        if granted {
            debug!(url = self.base_url, "user can manage plugins");
        } else {
            warn!(
                url = self.base_url,
                "user lacks the manage_plugins capability; plugin listing is gated"
            );
        }
        Ok(None)
    }

    /// Active plugins from the WooCommerce status report
    async fn woocommerce_plugins(&self, headers: &AuthHeaders) -> Result<Option<Listing>> {
        let reply = self
            .transport
            .get(&self.endpoint(WOOCOMMERCE_STATUS_PATH), Some(headers))
            .await?;
        if reply.status.as_u16() != 200 {
            debug!(status = reply.status.as_u16(), "WooCommerce status unavailable");
            return Ok(None);
        }

        let report: Value = reply.json()?;
        Ok(match report.get("active_plugins") {
            Some(Value::Array(active)) => Some(Listing {
                count: active.len() as u64,
                items: active.iter().map(woocommerce_entry).collect(),
            }),
            _ => None,
        })
    }

    /// `Ok(Some)` for a 200 JSON list or map; permission errors are logged
    async fn list(&self, path: &str, headers: Option<&AuthHeaders>) -> Result<Option<Listing>> {
        let reply = self.transport.get(&self.endpoint(path), headers).await?;
        match reply.status.as_u16() {
            200 => Ok(Listing::from_value(reply.json()?)),
            status @ (401 | 403) => {
                warn!(
                    url = self.base_url,
                    path,
                    status,
                    "capability gap: user may not read this endpoint"
                );
                Ok(None)
            }
            status => {
                debug!(path, status, "endpoint unavailable");
                Ok(None)
            }
        }
    }

    async fn scan_plugin_markup(&self) -> Result<Vec<String>> {
        let reply = self.transport.get(self.base_url, None).await?;
        if !reply.is_success() {
            return Err(Error::HttpStatus(reply.status.as_u16()));
        }
        Ok(plugin_slugs_from_markup(&reply.body))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Unique plugin directory names referenced by the markup, in page order
pub(crate) fn plugin_slugs_from_markup(html: &str) -> Vec<String> {
    let content = html.to_lowercase();
    let mut seen = HashSet::new();
    PLUGIN_PATH_PATTERN
        .captures_iter(&content)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .filter(|slug| slug.len() > 1 && !SKIP_PLUGIN_SLUGS.contains(&slug.as_str()))
        .filter(|slug| seen.insert(slug.clone()))
        .collect()
}

/// Per-item details for array listings only
fn detailed<T>(listing: &Listing, map: fn(&Value) -> T) -> Option<Vec<T>> {
    if listing.items.is_empty() {
        return None;
    }
    Some(listing.items.iter().map(map).collect())
}

/// Plugin entry of `/wp/v2/plugins`
fn plugin_from_rest(item: &Value) -> PluginInfo {
    let file = text_field(item, "plugin");
    let slug = file
        .split('/')
        .next()
        .unwrap_or_default()
        .trim_end_matches(".php")
        .to_string();
    let status = text_field(item, "status");
    PluginInfo {
        name: text_field(item, "name"),
        version: text_field(item, "version"),
        description: text_field(item, "description"),
        author: text_field(item, "author"),
        active: status == "active" || status == "network-active",
        update_available: false,
        latest_version: None,
        slug,
    }
}

/// WooCommerce `active_plugins` entry reshaped like a `/wp/v2/plugins` entry
fn woocommerce_entry(item: &Value) -> Value {
    let mut entry = item.clone();
    if let Value::Object(map) = &mut entry {
        map.insert("status".to_string(), Value::String("active".to_string()));
        if let Some(author) = map.get("author_name").cloned() {
            map.entry("author").or_insert(author);
        }
    }
    entry
}

/// Theme entry of `/wp/v2/themes`
fn theme_from_rest(item: &Value) -> ThemeInfo {
    ThemeInfo {
        name: text_field(item, "name"),
        version: text_field(item, "version"),
        description: text_field(item, "description"),
        author: text_field(item, "author"),
        active: text_field(item, "status") == "active",
        update_available: false,
        latest_version: None,
        slug: text_field(item, "stylesheet"),
    }
}

/// Plain string, or the `raw`/`rendered` member of a REST text object
fn text_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(obj)) => obj
            .get("raw")
            .or_else(|| obj.get("rendered"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn nullable_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Count sent as a number or, straight from `$wpdb`, as a numeric string
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
