//! Polygon stock-market MCP server entry point.
//!
//! Serves the fifteen stock tools over stdin/stdout. Logs go to stderr.
//! Refuses to start without a Polygon API key.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use market_query::mcp::McpServer;
use market_query::observability::init_tracing;
use market_query::tools::ToolAdapter;
use market_query::types::ObservabilityConfig;
use market_query::Config;

#[derive(Debug, Parser)]
#[command(name = "polygon-mcp", version, about = "Polygon.io stock tools over MCP stdio")]
struct Cli {
    /// Polygon API key.
    #[arg(long, env = "POLYGON_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Upstream base URL.
    #[arg(long, env = "POLYGON_BASE_URL")]
    base_url: Option<String>,

    /// Per-request upstream timeout in seconds.
    #[arg(long, env = "POLYGON_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Maximum tool calls processed concurrently.
    #[arg(long)]
    max_in_flight: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match build_config(cli) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&ObservabilityConfig::default());
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.observability);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_config(cli: Cli) -> market_query::Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(key) = cli.api_key.filter(|k| !k.trim().is_empty()) {
        config.upstream.api_key = Some(key);
    }
    if let Some(url) = cli.base_url {
        config.upstream.base_url = url;
    }
    if let Some(secs) = cli.timeout_secs {
        config.upstream.request_timeout = Duration::from_secs(secs);
    }
    if let Some(n) = cli.max_in_flight {
        config.server.max_in_flight = n;
    }
    config.validate()?;
    Ok(config)
}

async fn run(config: Config) -> market_query::Result<()> {
    let adapter = Arc::new(ToolAdapter::new(&config.upstream)?);
    let server = McpServer::new(adapter, config.server.clone());

    let shutdown = server.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            shutdown.cancel();
        }
    });

    tracing::info!("polygon-mcp {} serving on stdio", env!("CARGO_PKG_VERSION"));
    server.serve_stdio().await
}
