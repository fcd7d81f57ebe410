// Runtime configuration of the gateway process

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REGISTRY_PATH: &str = "./config/config.json";
pub const DEFAULT_STATIC_DIR: &str = "./static";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
	/// Address the HTTP listener binds to
	pub listen: SocketAddr,
	/// Registry document, re-read when its modification time advances
	pub registry_path: PathBuf,
	/// Directory served at `/`
	pub static_dir: PathBuf,
	/// How often the registry file is polled
	pub poll_interval: Duration,
}

impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
			registry_path: PathBuf::from(DEFAULT_REGISTRY_PATH),
			static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
			poll_interval: DEFAULT_POLL_INTERVAL,
		}
	}
}
