// Registry client for reading the registry document from disk

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::info;

use super::error::RegistryError;
use super::types::Registry;

/// Client for fetching registry data from a local file
#[derive(Debug, Clone)]
pub struct RegistryClient {
	path: PathBuf,
}

impl RegistryClient {
	/// Create a new registry client
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Get the file path
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Fetch the registry from the configured file
	pub async fn fetch(&self) -> Result<Registry, RegistryError> {
		info!(target: "cmdgateway", "Loading registry from file: {}", self.path.display());
		let content = fs_err::tokio::read_to_string(&self.path).await?;
		let registry: Registry = serde_json::from_str(&content)?;
		info!(target: "cmdgateway", "Loaded {} commands from registry file", registry.len());
		Ok(registry)
	}

	/// Modification time of the registry file
	pub async fn modified(&self) -> Result<SystemTime, RegistryError> {
		let metadata = fs_err::tokio::metadata(&self.path).await?;
		Ok(metadata.modified()?)
	}
}

/// Parse a duration string like "5m", "30s", "1h"
pub fn parse_duration(s: &str) -> Result<Duration, RegistryError> {
	let s = s.trim();
	if s.is_empty() {
		return Err(RegistryError::InvalidDuration("empty duration string".into()));
	}

	let (num_str, unit) = if let Some(num) = s.strip_suffix("ms") {
		(num, "ms")
	} else if let Some(num) = s.strip_suffix('s') {
		(num, "s")
	} else if let Some(num) = s.strip_suffix('m') {
		(num, "m")
	} else if let Some(num) = s.strip_suffix('h') {
		(num, "h")
	} else if let Some(num) = s.strip_suffix('d') {
		(num, "d")
	} else {
		// Assume seconds if no unit
		(s, "s")
	};

	let num: u64 = num_str
		.parse()
		.map_err(|_| RegistryError::InvalidDuration(format!("invalid duration number: {}", num_str)))?;

	let seconds_per_unit: u64 = match unit {
		"ms" => return Ok(Duration::from_millis(num)),
		"s" => 1,
		"m" => 60,
		"h" => 60 * 60,
		_ => 60 * 60 * 24,
	};

	num.checked_mul(seconds_per_unit)
		.map(Duration::from_secs)
		.ok_or_else(|| RegistryError::InvalidDuration(format!("duration out of range: {}", s)))
}
