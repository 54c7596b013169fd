use anyhow::Context as _;
use apigate_gateway::service::GatewayService;
use apigate_gateway::{build_router, config};
use apigate_rest_tools::dispatch::ToolDispatcher;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "apigate-gateway", version, about)]
struct Cli {
    /// Catalog file describing the upstream API (YAML or JSON).
    #[arg(long, env = "APIGATE_CONFIG")]
    config: PathBuf,

    /// Address to listen on.
    #[arg(long, env = "APIGATE_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Default per-request timeout towards the upstream API, in seconds.
    /// Catalogs may override it via `defaults.timeoutSecs`.
    #[arg(long, env = "APIGATE_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Log filter, e.g. `info` or `apigate_rest_tools=debug`.
    #[arg(long, env = "APIGATE_LOG", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "APIGATE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    let catalog = config::load_catalog(&cli.config)
        .with_context(|| format!("loading catalog '{}'", cli.config.display()))?;
    let server_name = catalog.server_name.clone();

    let dispatcher = ToolDispatcher::new(catalog, Duration::from_secs(cli.timeout_secs))
        .context("compiling catalog")?;
    let tool_count = dispatcher.list_tools().len();

    let (router, sse_ct) = build_router(GatewayService::new(dispatcher), cli.bind);

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("binding {}", cli.bind))?;

    tracing::info!(
        addr = %cli.bind,
        tools = tool_count,
        server = server_name.as_deref().unwrap_or("apigate-gateway"),
        "gateway listening on /sse and /mcp"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(sse_ct))
        .await
        .context("serving")?;

    Ok(())
}

fn init_tracing(filter: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter).context("invalid log filter")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn shutdown_signal(sse_ct: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    // Close open event streams; in-flight invocations are abandoned with
    // their sessions.
    sse_ct.cancel();
}
