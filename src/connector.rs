//! Entry point tying the connection test and inventory together

use crate::auth::build_headers;
use crate::config::ConnectionConfig;
use crate::connection::{ConnectionOutcome, ConnectionTester};
use crate::error::Result;
use crate::inventory::{InventoryAggregator, InventorySnapshot};
use crate::probe::{SiteProbe, SiteProbeResult};
use crate::transport::Transport;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Connection outcome plus inventory, when the connection succeeded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub outcome: ConnectionOutcome,
    pub inventory: Option<InventorySnapshot>,
}

/// One remote site, ready to be probed, tested, and inventoried
///
/// # Example
///
/// ```no_run
/// use wordpress_connect::{AuthMethod, ConnectionConfig, Connector};
///
/// # async fn run() -> wordpress_connect::Result<()> {
/// let config = ConnectionConfig::builder("https://blog.example.com")
///     .method(AuthMethod::ApplicationPassword)
///     .username("admin")
///     .secret("abcd efgh ijkl mnop")
///     .build()?;
/// let report = Connector::new(config)?.sync().await;
/// println!("connected: {}", report.outcome.success);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Connector {
    config: ConnectionConfig,
    transport: Transport,
}

impl Connector {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let transport = Transport::new(config.timeout())?;
        Ok(Self { config, transport })
    }

    /// Abort in-flight and pending requests once `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.transport = self.transport.with_cancellation(token);
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub async fn probe(&self) -> Result<SiteProbeResult> {
        SiteProbe::new(&self.transport)
            .probe(self.config.target_url())
            .await
    }

    pub async fn test_connection(&self) -> ConnectionOutcome {
        ConnectionTester::new(&self.config, &self.transport)
            .test_connection()
            .await
    }

    /// Inventory with the configured credentials; never fails
    pub async fn collect_inventory(&self) -> InventorySnapshot {
        let headers = match build_headers(&self.config) {
            Ok(headers) => headers,
            Err(err) => {
                warn!(url = self.config.target_url(), error = %err, "skipping inventory");
                return InventorySnapshot::unavailable(err.kind());
            }
        };

        InventoryAggregator::new(self.config.target_url(), &self.transport)
            .collect(&headers)
            .await
    }

    /// Connection test, then inventory when the test succeeded
    pub async fn sync(&self) -> SyncReport {
        let outcome = self.test_connection().await;
        let inventory = if outcome.success {
            Some(self.collect_inventory().await)
        } else {
            None
        };
        SyncReport { outcome, inventory }
    }
}

/// Build a [`Connector`] for `config` and run a full sync
pub async fn connect(config: ConnectionConfig) -> Result<SyncReport> {
    Ok(Connector::new(config)?.sync().await)
}
