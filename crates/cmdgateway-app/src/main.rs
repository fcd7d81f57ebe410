use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use cmdgateway::config::{DEFAULT_REGISTRY_PATH, DEFAULT_STATIC_DIR};
use cmdgateway::registry::parse_duration;
use cmdgateway::{GatewayConfig, RegistryClient, RegistryStore, http};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Serve a fixed set of shell commands over WebSocket")]
struct Args {
	/// Registry document (command name -> parameter schema)
	#[arg(long, env = "CONFIG_PATH", default_value = DEFAULT_REGISTRY_PATH)]
	config: PathBuf,

	/// Address to listen on
	#[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
	listen: SocketAddr,

	/// Directory with the web UI
	#[arg(long, env = "STATIC_DIR", default_value = DEFAULT_STATIC_DIR)]
	static_dir: PathBuf,

	/// Registry poll interval, e.g. 500ms, 5s, 1m
	#[arg(long, env = "POLL_INTERVAL", default_value = "5s", value_parser = parse_interval)]
	poll_interval: Duration,
}

impl From<Args> for GatewayConfig {
	fn from(args: Args) -> Self {
		GatewayConfig {
			listen: args.listen,
			registry_path: args.config,
			static_dir: args.static_dir,
			poll_interval: args.poll_interval,
		}
	}
}

fn parse_interval(s: &str) -> Result<Duration, String> {
	parse_duration(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let config = GatewayConfig::from(Args::parse());
	info!(?config, "starting cmdgateway");

	// Without a valid registry there is nothing to serve
	let store = RegistryStore::load(RegistryClient::new(&config.registry_path))
		.await
		.with_context(|| format!("failed to load registry from {}", config.registry_path.display()))?;
	let poller = store.spawn_poller(config.poll_interval);

	let listener = tokio::net::TcpListener::bind(config.listen)
		.await
		.with_context(|| format!("failed to bind {}", config.listen))?;
	let router = http::router(store, &config.static_dir);

	http::serve(listener, router, shutdown_signal()).await?;

	if let Some(poller) = poller {
		poller.abort();
	}
	info!("shutdown complete");
	Ok(())
}

async fn shutdown_signal() {
	match tokio::signal::ctrl_c().await {
		Ok(()) => info!("received shutdown signal"),
		Err(e) => {
			// no signal handler: run until killed
			tracing::warn!("failed to install Ctrl-C handler: {}", e);
			std::future::pending::<()>().await;
		},
	}
}
