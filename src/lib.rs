//! WordPress Connect - remote WordPress connection and introspection
//!
//! Detects whether a URL hosts WordPress, verifies credentials against the
//! REST API, reads site metadata and the core version, and collects a
//! plugin, theme, and post inventory.
//!
//! # Example
//!
//! ```no_run
//! use wordpress_connect::{AuthMethod, ConnectionConfig};
//!
//! #[tokio::main]
//! async fn main() -> wordpress_connect::Result<()> {
//!     let config = ConnectionConfig::builder("https://example.com")
//!         .method(AuthMethod::ApplicationPassword)
//!         .username("admin")
//!         .secret("abcd efgh ijkl mnop qrst uvwx")
//!         .build()?;
//!     let report = wordpress_connect::connect(config).await?;
//!     println!("WordPress: {}", report.outcome.wp_version);
//!     Ok(())
//! }
//! ```

pub mod auth;
mod cascade;
pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod inventory;
pub mod output;
pub mod probe;
pub mod transport;
pub mod version;

pub use auth::{AuthHeaders, AuthMethod, Credential, build_headers};
pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use connection::{ConnectionOutcome, ConnectionTester, SiteInfo};
pub use connector::{Connector, SyncReport, connect};
pub use error::{Error, ErrorKind, Result};
pub use inventory::{
    InventoryAggregator, InventorySnapshot, InventorySource, PluginInfo, ThemeInfo,
};
pub use output::{OutputConfig, OutputFormat, OutputSort, output_report};
pub use probe::{DetectionMethod, SiteProbe, SiteProbeResult};
pub use transport::{HttpReply, Transport};
pub use version::VersionDetector;
pub use tokio_util::sync::CancellationToken;
