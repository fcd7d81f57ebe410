// Argument vector construction
//
// Turns caller-supplied key/value pairs into the argv of a registered
// command. Values never pass through a shell: each one becomes a single
// argv element, and flag tokens only ever come from the schema.

use std::collections::HashMap;

use thiserror::Error;

use super::compiled::CompiledCommand;
use super::types::{ParamKey, ParamType};

/// Validation failures; the display text is sent to the caller verbatim
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
	#[error("Missing argument: {key}")]
	MissingArgument { key: String },

	#[error("Argument {key} must be an integer")]
	InvalidType { key: String, expected: ParamType },
}

impl ArgumentError {
	/// The schema key the failure refers to
	pub fn key(&self) -> &str {
		match self {
			ArgumentError::MissingArgument { key } | ArgumentError::InvalidType { key, .. } => key,
		}
	}
}

impl CompiledCommand {
	/// Build the argument vector for this command.
	///
	/// Plain parameters without a value (absent or empty) are skipped.
	/// Flag-emitting parameters are required once declared: a missing
	/// value is an error.
	pub fn build_args(&self, supplied: &HashMap<String, String>) -> Result<Vec<String>, ArgumentError> {
		let mut args = Vec::with_capacity(self.params.len() * 2);

		for param in &self.params {
			let value = supplied
				.get(param.key.key())
				.map(String::as_str)
				.filter(|v| !v.is_empty());

			let Some(value) = value else {
				if let ParamKey::Flagged { key, .. } = &param.key {
					return Err(ArgumentError::MissingArgument { key: key.clone() });
				}
				continue;
			};

			if param.param_type == ParamType::Int && value.parse::<i64>().is_err() {
				return Err(ArgumentError::InvalidType {
					key: param.key.key().to_string(),
					expected: ParamType::Int,
				});
			}

			if let Some(flag) = param.key.flag() {
				args.push(flag.to_string());
			}
			args.push(value.to_string());
		}

		Ok(args)
	}
}
