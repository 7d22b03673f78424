//! WordPress Connect CLI - Test a connection to a WordPress site and list its inventory

use clap::{Parser, ValueEnum};
use std::process::ExitCode;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use wordpress_connect::{
    AuthMethod, CancellationToken, ConnectionConfig, Connector, SyncReport,
    output::{OutputConfig, OutputFormat, OutputSort, output_report},
};

/// WordPress connection tester - verifies credentials and reads site inventory
#[derive(Parser, Debug)]
#[command(name = "wordpress-connect")]
#[command(version, about, long_about = None)]
struct Args {
    /// URL of the WordPress site
    url: String,

    /// Authentication method
    #[arg(long = "method", default_value = "application-password", value_enum)]
    method: AuthMethodArg,

    /// WordPress username (application passwords only)
    #[arg(short = 'u', long = "username", env = "WP_CONNECT_USERNAME")]
    username: Option<String>,

    /// Credential for the chosen method
    #[arg(long = "secret", env = "WP_CONNECT_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", default_value_t = 10)]
    timeout: u64,

    /// Allow connecting to private/internal IP addresses (localhost, 192.168.x.x, etc.)
    #[arg(long = "allow-private")]
    allow_private: bool,

    /// Only test the connection, skip the inventory
    #[arg(long = "skip-inventory")]
    skip_inventory: bool,

    /// Output format
    #[arg(short = 'o', long = "output", default_value = "human", value_enum)]
    output_format: OutputFormatArg,

    /// Sort order for plugins and themes
    #[arg(long = "sort", default_value = "name", value_enum)]
    sort: OutputSortArg,
}

/// Authentication method argument
#[derive(Clone, Copy, Debug, ValueEnum)]
enum AuthMethodArg {
    /// Username plus application password (HTTP Basic)
    ApplicationPassword,
    /// JWT bearer token
    JwtToken,
    /// OAuth bearer token
    Oauth,
    /// API key header
    ApiKey,
    /// REST nonce from a logged-in browser session
    CookieAuth,
    /// Token for the companion extension
    CustomToken,
    /// Session token in `session_id:nonce` form
    SessionAuth,
}

impl From<AuthMethodArg> for AuthMethod {
    fn from(arg: AuthMethodArg) -> Self {
        match arg {
            AuthMethodArg::ApplicationPassword => AuthMethod::ApplicationPassword,
            AuthMethodArg::JwtToken => AuthMethod::JwtToken,
            AuthMethodArg::Oauth => AuthMethod::Oauth,
            AuthMethodArg::ApiKey => AuthMethod::ApiKey,
            AuthMethodArg::CookieAuth => AuthMethod::CookieAuth,
            AuthMethodArg::CustomToken => AuthMethod::CustomToken,
            AuthMethodArg::SessionAuth => AuthMethod::SessionAuth,
        }
    }
}

/// Output format argument
#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormatArg {
    Human,
    Json,
    None,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::None => OutputFormat::None,
        }
    }
}

/// Output sort argument
#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputSortArg {
    /// Sort alphabetically by name (default)
    Name,
    /// Updates first, then active items, then by name
    Status,
}

impl From<OutputSortArg> for OutputSort {
    fn from(arg: OutputSortArg) -> Self {
        match arg {
            OutputSortArg::Name => OutputSort::Name,
            OutputSortArg::Status => OutputSort::Status,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr so JSON on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Print banner for human output
    if matches!(args.output_format, OutputFormatArg::Human) {
        print_banner();
    }

    let output_config = OutputConfig::new(args.output_format.into(), args.sort.into());

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            ctrl_c.cancel();
        }
    });

    match run(&args, token, &output_config).await {
        Ok(report) if report.outcome.success => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    args: &Args,
    token: CancellationToken,
    output_config: &OutputConfig,
) -> wordpress_connect::Result<SyncReport> {
    let mut builder = ConnectionConfig::builder(&args.url)
        .method(args.method.into())
        .timeout(Duration::from_secs(args.timeout))
        .allow_private(args.allow_private);
    if let Some(username) = &args.username {
        builder = builder.username(username.as_str());
    }
    if let Some(secret) = &args.secret {
        builder = builder.secret(secret.as_str());
    }

    let connector = Connector::new(builder.build()?)?.with_cancellation(token);
    let report = if args.skip_inventory {
        SyncReport {
            outcome: connector.test_connection().await,
            inventory: None,
        }
    } else {
        connector.sync().await
    };

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();
    output_report(&report, output_config, &mut writer)?;

    Ok(report)
}

fn print_banner() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    println!("WordPress Connect v{}", VERSION);
    println!("by Robert F. Ecker <robert@robdotec.com>");
    println!();
}
