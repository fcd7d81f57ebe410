// Registry error types

use thiserror::Error;

/// Errors that can occur while loading or reloading the command registry
#[derive(Error, Debug)]
pub enum RegistryError {
	#[error("failed to parse registry: {0}")]
	ParseError(#[from] serde_json::Error),

	#[error("failed to read registry file: {0}")]
	IoError(#[from] std::io::Error),

	#[error("command '{command}': parameter '{key}' has unsupported type '{declared}'")]
	UnsupportedType {
		command: String,
		key: String,
		declared: String,
	},

	#[error("command '{command}': malformed parameter key '{key}': {reason}")]
	MalformedKey {
		command: String,
		key: String,
		reason: &'static str,
	},

	#[error("invalid duration: {0}")]
	InvalidDuration(String),
}

impl RegistryError {
	pub fn malformed_key(command: impl Into<String>, key: impl Into<String>, reason: &'static str) -> Self {
		Self::MalformedKey {
			command: command.into(),
			key: key.into(),
			reason,
		}
	}
}
