use clap::{Args, Parser, Subcommand};
use restmcp_client::{ClientConfig, RetryPolicy, UpstreamClient, DEFAULT_UPSTREAM_URL};
use restmcp_proxy::{ProxyConfig, RestProxy};
use restmcp_server::{ServerConfig, ToolServer, DEFAULT_PORT};
use restmcp_types::OperationCall;
use serde_json::{Map, Value};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "restmcp",
    about = "REST-to-MCP forwarding proxy and toy tool server",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the tool server
    Server(ServerArgs),
    /// Run the REST proxy in front of an existing tool server
    Proxy(ProxyArgs),
    /// Run the tool server and the REST proxy in one process
    All(AllArgs),
    /// Call one tool (or protocol method) and print the result
    Call(CallArgs),
    /// List the tools an upstream server exposes
    Tools(UpstreamArgs),
}

#[derive(Args, Clone)]
struct ServerArgs {
    /// Bind host for the tool server
    #[arg(long, env = "RESTMCP_SERVER_HOST", default_value = "127.0.0.1")]
    server_host: IpAddr,

    /// Port for the tool server
    #[arg(long, env = "RESTMCP_SERVER_PORT", default_value_t = DEFAULT_PORT)]
    server_port: u16,

    /// Environment name reported by get_server_info
    #[arg(long, env = "RESTMCP_ENVIRONMENT", default_value = "development")]
    environment: String,

    /// Always answer with application/json, never text/event-stream
    #[arg(long)]
    no_streaming: bool,
}

#[derive(Args, Clone)]
struct ProxyArgs {
    /// Upstream MCP endpoint (defaults to the bundled tool server)
    #[arg(long, env = "RESTMCP_UPSTREAM_URL", value_name = "URL")]
    upstream: Option<String>,

    /// Address the REST proxy listens on
    #[arg(long, env = "RESTMCP_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Require `Authorization: Bearer <token>` on inbound requests
    #[arg(long, env = "RESTMCP_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Skip the startup handshake; the first request opens the session
    #[arg(long)]
    lazy_handshake: bool,

    /// Startup handshake attempts
    #[arg(long, default_value_t = 10)]
    handshake_attempts: u32,

    /// Delay between startup handshake attempts, in milliseconds
    #[arg(long, default_value_t = 2000)]
    handshake_delay_ms: u64,

    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Upstream connect timeout in seconds
    #[arg(long, default_value_t = 5)]
    connect_timeout_secs: u64,

    /// Extra headers sent upstream (format: key:value)
    #[arg(long = "header", value_name = "KEY:VALUE")]
    headers: Vec<String>,
}

#[derive(Args)]
struct AllArgs {
    #[command(flatten)]
    server: ServerArgs,

    #[command(flatten)]
    proxy: ProxyArgs,
}

#[derive(Args)]
struct UpstreamArgs {
    /// Upstream MCP endpoint
    #[arg(long, env = "RESTMCP_UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    upstream: String,
}

#[derive(Args)]
struct CallArgs {
    /// Tool name, or a protocol method such as tools/list
    name: String,

    /// Arguments as a JSON object
    #[arg(long, default_value = "{}")]
    args: String,

    #[command(flatten)]
    upstream: UpstreamArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Command::Server(args) => {
            let (server, addr) = tool_server(&args);
            server.run(addr, shutdown_signal()).await?;
        }
        Command::Proxy(args) => {
            let upstream = args.upstream.clone().unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());
            let proxy = rest_proxy(&args, &upstream)?;
            proxy.run(shutdown_signal()).await?;
        }
        Command::All(args) => run_all(args).await?,
        Command::Call(args) => call(args).await?,
        Command::Tools(args) => list_tools(args).await?,
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn tool_server(args: &ServerArgs) -> (ToolServer, SocketAddr) {
    let config = ServerConfig::default()
        .with_environment(args.environment.clone())
        .with_port(args.server_port)
        .with_streaming(!args.no_streaming);
    (
        ToolServer::new(config),
        SocketAddr::new(args.server_host, args.server_port),
    )
}

fn rest_proxy(args: &ProxyArgs, upstream: &str) -> anyhow::Result<RestProxy> {
    let upstream = validate_upstream_url(upstream)?;

    let mut client = ClientConfig::new(upstream)
        .with_timeout(Duration::from_secs(args.timeout_secs))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout_secs))
        .with_handshake_retry(RetryPolicy::fixed(
            args.handshake_attempts,
            Duration::from_millis(args.handshake_delay_ms),
        ));
    for header in &args.headers {
        let (key, value) = parse_header(header)?;
        client = client.with_header(key, value);
    }

    let mut config = ProxyConfig::default()
        .with_listen_addr(args.listen)
        .with_startup_handshake(!args.lazy_handshake);
    config.auth_token = args.auth_token.clone();

    Ok(RestProxy::connect(client, config)?)
}

async fn run_all(args: AllArgs) -> anyhow::Result<()> {
    let (server, server_addr) = tool_server(&args.server);
    let upstream = args.proxy.upstream.clone().unwrap_or_else(|| {
        let host = if server_addr.ip().is_unspecified() {
            IpAddr::from([127, 0, 0, 1])
        } else {
            server_addr.ip()
        };
        format!("http://{}/mcp", SocketAddr::new(host, server_addr.port()))
    });
    let proxy = rest_proxy(&args.proxy, &upstream)?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    let server_stop = stopped(stop_rx.clone());
    let proxy_stop = stopped(stop_rx);
    tokio::try_join!(
        async { server.run(server_addr, server_stop).await.map_err(anyhow::Error::from) },
        async { proxy.run(proxy_stop).await.map_err(anyhow::Error::from) },
    )?;
    Ok(())
}

async fn call(args: CallArgs) -> anyhow::Result<()> {
    let arguments: Map<String, Value> = serde_json::from_str(&args.args)
        .map_err(|e| anyhow::anyhow!("--args must be a JSON object: {}", e))?;
    let client = smoke_client(&args.upstream.upstream)?;

    let result = client.call(&OperationCall::new(args.name, arguments)).await?;
    match result {
        Value::String(text) => println!("{}", text),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}

async fn list_tools(args: UpstreamArgs) -> anyhow::Result<()> {
    let client = smoke_client(&args.upstream)?;
    let tools = client.list_tools().await?;

    println!("{} tools available:", tools.len());
    for tool in tools {
        println!(
            "- {}: {}",
            tool.name,
            tool.description.as_deref().unwrap_or("no description")
        );
    }
    Ok(())
}

/// Client for one-off commands: a single handshake attempt, no retries
fn smoke_client(upstream: &str) -> anyhow::Result<UpstreamClient> {
    let url = validate_upstream_url(upstream)?;
    let config = ClientConfig::new(url)
        .with_handshake_retry(RetryPolicy::once())
        .with_client_info("restmcp-cli", env!("CARGO_PKG_VERSION"));
    Ok(UpstreamClient::new(config)?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for interrupt signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received interrupt signal, shutting down gracefully");
}

fn stopped(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _ = rx.changed().await;
    }
}

fn validate_upstream_url(url: &str) -> anyhow::Result<String> {
    use url::Url;

    let parsed = Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid URL '{}': {}", url, e))?;

    match parsed.scheme() {
        "http" | "https" => Ok(url.to_string()),
        scheme => {
            anyhow::bail!("Unsupported URL scheme '{}'. Use http:// or https://", scheme);
        }
    }
}

fn parse_header(header: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = header
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Invalid header '{}', expected KEY:VALUE", header))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Invalid header '{}': empty name", header);
    }
    Ok((key.to_string(), value.trim().to_string()))
}
