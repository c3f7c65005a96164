//! Wormhole relay process

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wormhole_connectors::{
    default_dimension_registry, default_stargate_registry, ConnectorConfig, DimensionRuntime,
    StargateRuntime,
};

/// Wormhole - relays HTTP requests and Kafka records between two processes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ingest role: collect messages with MODULE and hand them to BRIDGE
    Stargate(RoleArgs),
    /// Run the delivery role: take messages from BRIDGE and deliver them with MODULE
    Dimension(RoleArgs),
    /// List modules and bridges with their configuration keys
    List,
}

#[derive(Args, Debug)]
struct RoleArgs {
    /// Module name (e.g. http, kafka)
    module: String,

    /// Bridge name (e.g. file, skip)
    bridge: String,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Args, Debug)]
struct Settings {
    /// Log at debug level
    #[arg(long, env = "WORMHOLE_IS_DEBUG")]
    is_debug: bool,

    /// Capacity of the queue between module and bridge
    #[arg(long, env = "WORMHOLE_CHANNEL_SIZE")]
    channel_size: Option<usize>,

    /// Address the http ingest module listens on
    #[arg(long, env = "WORMHOLE_LISTEN")]
    listen: Option<String>,

    /// Host the http delivery module replays requests against
    #[arg(long, env = "WORMHOLE_BIND")]
    bind: Option<String>,

    /// Timeout of one replayed request in seconds
    #[arg(long, env = "WORMHOLE_HTTP_TIMEOUT")]
    http_timeout: Option<u64>,

    /// Comma-separated Kafka brokers
    #[arg(long, env = "WORMHOLE_KAFKA_ADDRS")]
    kafka_addrs: Option<String>,

    /// Comma-separated topics to consume
    #[arg(long, env = "WORMHOLE_KAFKA_TOPICS")]
    kafka_topics: Option<String>,

    /// SASL user name
    #[arg(long, env = "WORMHOLE_KAFKA_USER")]
    kafka_user: Option<String>,

    /// SASL password
    #[arg(long, env = "WORMHOLE_KAFKA_PASSWD", hide_env_values = true)]
    kafka_passwd: Option<String>,

    /// SASL mechanism (PLAIN, SCRAM-SHA-256, SCRAM-SHA-512)
    #[arg(long, env = "WORMHOLE_KAFKA_MECHANISM")]
    kafka_mechanism: Option<String>,

    /// Directory completed spool files are handed off in
    #[arg(long, env = "WORMHOLE_HANDLING_PATH")]
    handling_path: Option<String>,

    /// Directory spool files are written in before hand-off
    #[arg(long, env = "WORMHOLE_STAGING_PATH")]
    staging_path: Option<String>,

    /// Seconds of inactivity before the open spool file is handed off
    #[arg(long, env = "WORMHOLE_WRITER_TICK")]
    writer_tick: Option<u64>,

    /// Size in bytes at which the open spool file is rotated
    #[arg(long, env = "WORMHOLE_FILE_MAX_SIZE")]
    file_max_size: Option<u64>,

    /// Seconds between scans of the handling directory
    #[arg(long, env = "WORMHOLE_SCAN_INTERVAL")]
    scan_interval: Option<u64>,

    /// Spool files forwarded concurrently
    #[arg(long, env = "WORMHOLE_READER_WORKERS")]
    reader_workers: Option<usize>,

    /// Any other setting, e.g. --set kafka.client.linger.ms=5
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    extra: Vec<(String, String)>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

impl Settings {
    /// Maps the given flags onto configuration keys.
    fn to_config(&self, role: &str) -> ConnectorConfig {
        let mut config = ConnectorConfig::new(role);
        for (key, value) in &self.extra {
            config.set(key.as_str(), value.as_str());
        }

        let flags = [
            ("runtime.channel.size", self.channel_size.map(|v| v.to_string())),
            ("http.listen", self.listen.clone()),
            ("http.bind", self.bind.clone()),
            ("http.timeout.secs", self.http_timeout.map(|v| v.to_string())),
            ("kafka.addrs", self.kafka_addrs.clone()),
            ("kafka.topics", self.kafka_topics.clone()),
            ("kafka.user", self.kafka_user.clone()),
            ("kafka.passwd", self.kafka_passwd.clone()),
            ("kafka.mechanism", self.kafka_mechanism.clone()),
            ("spool.handling.path", self.handling_path.clone()),
            ("spool.staging.path", self.staging_path.clone()),
            ("spool.writer.tick.secs", self.writer_tick.map(|v| v.to_string())),
            ("spool.file.max.size", self.file_max_size.map(|v| v.to_string())),
            ("spool.scan.interval.secs", self.scan_interval.map(|v| v.to_string())),
            ("spool.reader.workers", self.reader_workers.map(|v| v.to_string())),
        ];
        for (key, value) in flags {
            if let Some(value) = value {
                config.set(key, value);
            }
        }
        config
    }
}

fn init_tracing(is_debug: bool) {
    let level = if is_debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("wormhole={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves once the process is asked to stop.
async fn termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let kinds = [
            SignalKind::terminate(),
            SignalKind::hangup(),
            SignalKind::quit(),
        ];
        let mut streams = Vec::new();
        for kind in kinds {
            match signal(kind) {
                Ok(stream) => streams.push(stream),
                Err(e) => warn!(error = %e, "cannot install signal handler"),
            }
        }
        let others = any_signal(&mut streams);
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            () = others => {}
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(unix)]
async fn any_signal(streams: &mut [tokio::signal::unix::Signal]) {
    if streams.is_empty() {
        return std::future::pending::<()>().await;
    }
    std::future::poll_fn(|cx| {
        for stream in streams.iter_mut() {
            if stream.poll_recv(cx).is_ready() {
                return std::task::Poll::Ready(());
            }
        }
        std::task::Poll::Pending
    })
    .await;
}

/// Installs signal handling and returns the shutdown signal.
fn shutdown_on_signal() -> watch::Receiver<bool> {
    let (stop, signal) = watch::channel(false);
    tokio::spawn(async move {
        termination().await;
        info!("termination signal received, shutting down");
        stop.send_replace(true);
    });
    signal
}

async fn run_stargate(args: RoleArgs) -> Result<()> {
    let config = args.settings.to_config("stargate");
    let mut runtime = StargateRuntime::new(default_stargate_registry());
    runtime
        .setup(&args.module, &args.bridge, &config)
        .await
        .with_context(|| format!("stargate setup ({} -> {})", args.module, args.bridge))?;
    runtime
        .run(shutdown_on_signal())
        .await
        .context("stargate stopped with error")
}

async fn run_dimension(args: RoleArgs) -> Result<()> {
    let config = args.settings.to_config("dimension");
    let mut runtime = DimensionRuntime::new(default_dimension_registry());
    runtime
        .setup(&args.module, &args.bridge, &config)
        .await
        .with_context(|| format!("dimension setup ({} -> {})", args.bridge, args.module))?;
    runtime
        .run(shutdown_on_signal())
        .await
        .context("dimension stopped with error")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::List => {
            println!("stargate\n{}", default_stargate_registry().help());
            println!("dimension\n{}", default_dimension_registry().help());
            Ok(())
        }
        Command::Stargate(args) => {
            init_tracing(args.settings.is_debug);
            info!(version = env!("CARGO_PKG_VERSION"), module = %args.module, bridge = %args.bridge, "starting stargate");
            run_stargate(args).await
        }
        Command::Dimension(args) => {
            init_tracing(args.settings.is_debug);
            info!(version = env!("CARGO_PKG_VERSION"), module = %args.module, bridge = %args.bridge, "starting dimension");
            run_dimension(args).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_map_to_config_keys() {
        let cli = Cli::try_parse_from([
            "wormhole",
            "stargate",
            "kafka",
            "file",
            "--kafka-topics",
            "orders,payments",
            "--writer-tick",
            "2",
            "--set",
            "kafka.client.linger.ms=5",
        ])
        .unwrap();
        let Command::Stargate(args) = cli.command else {
            panic!("expected stargate");
        };
        assert_eq!(args.module, "kafka");
        assert_eq!(args.bridge, "file");

        let config = args.settings.to_config("stargate");
        assert_eq!(config.get("kafka.topics"), Some("orders,payments"));
        assert_eq!(config.get("spool.writer.tick.secs"), Some("2"));
        assert_eq!(config.get("kafka.client.linger.ms"), Some("5"));
        assert_eq!(config.get("http.listen"), None);
    }

    #[test]
    fn test_named_flags_override_set() {
        let cli = Cli::try_parse_from([
            "wormhole",
            "dimension",
            "http",
            "skip",
            "--set",
            "http.bind=a:1",
            "--bind",
            "b:2",
        ])
        .unwrap();
        let Command::Dimension(args) = cli.command else {
            panic!("expected dimension");
        };
        assert_eq!(args.settings.to_config("dimension").get("http.bind"), Some("b:2"));
    }

    #[test]
    fn test_rejects_malformed_set() {
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
        assert_eq!(
            parse_key_value("a.b=c=d").unwrap(),
            ("a.b".to_string(), "c=d".to_string())
        );
    }

    #[test]
    fn test_requires_module_and_bridge() {
        assert!(Cli::try_parse_from(["wormhole", "stargate", "http"]).is_err());
    }
}
