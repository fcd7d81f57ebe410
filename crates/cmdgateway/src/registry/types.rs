// Registry types for operator-defined commands
//
// The registry document maps each permitted executable to its parameter
// schema:
//
//   { "ls": { "path": "string", "count[-n]": "int" } }
//
// A key written as `name[flag]` emits the literal flag token ahead of the
// supplied value. Declaration order is preserved.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Parameter schema of a single command: parameter key -> declared type
pub type CommandSchema = IndexMap<String, String>;

/// Parsed registry document, exactly as the operator wrote it
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Registry {
	commands: IndexMap<String, CommandSchema>,
}

impl Registry {
	/// Create an empty registry
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style helper used when assembling registries in code
	pub fn with_command<K, T>(
		mut self,
		name: impl Into<String>,
		params: impl IntoIterator<Item = (K, T)>,
	) -> Self
	where
		K: Into<String>,
		T: Into<String>,
	{
		let schema = params
			.into_iter()
			.map(|(k, t)| (k.into(), t.into()))
			.collect();
		self.commands.insert(name.into(), schema);
		self
	}

	pub fn get(&self, name: &str) -> Option<&CommandSchema> {
		self.commands.get(name)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &CommandSchema)> {
		self.commands.iter()
	}

	/// Number of commands
	pub fn len(&self) -> usize {
		self.commands.len()
	}

	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}
}

/// Declared parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
	String,
	Int,
}

impl ParamType {
	/// Parse the type name used in the registry document
	pub fn from_declared(declared: &str) -> Option<Self> {
		match declared {
			"string" => Some(ParamType::String),
			"int" => Some(ParamType::Int),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ParamType::String => "string",
			ParamType::Int => "int",
		}
	}
}

impl fmt::Display for ParamType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A parameter key, split into its plain or flag-emitting form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKey {
	/// `path` - the value is emitted alone
	Plain { key: String },
	/// `count[-n]` - the flag token is emitted, then the value
	Flagged { key: String, name: String, flag: String },
}

/// Why a bracketed key could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
	EmptyFlag,
	EmptyName,
}

impl KeyError {
	pub fn reason(&self) -> &'static str {
		match self {
			KeyError::EmptyFlag => "empty flag token",
			KeyError::EmptyName => "empty parameter name",
		}
	}
}

impl ParamKey {
	/// Split a schema key. A key is bracketed when it ends with `]` and
	/// contains a `[`; the flag is everything between the first `[` and the
	/// trailing `]`.
	pub fn parse(key: &str) -> Result<Self, KeyError> {
		let bracketed = key
			.strip_suffix(']')
			.and_then(|body| body.find('[').map(|open| (&body[..open], &body[open + 1..])));

		match bracketed {
			None => Ok(ParamKey::Plain { key: key.to_string() }),
			Some((_, "")) => Err(KeyError::EmptyFlag),
			Some(("", _)) => Err(KeyError::EmptyName),
			Some((name, flag)) => Ok(ParamKey::Flagged {
				key: key.to_string(),
				name: name.to_string(),
				flag: flag.to_string(),
			}),
		}
	}

	/// The key exactly as written in the schema (and expected from callers)
	pub fn key(&self) -> &str {
		match self {
			ParamKey::Plain { key } | ParamKey::Flagged { key, .. } => key,
		}
	}

	pub fn flag(&self) -> Option<&str> {
		match self {
			ParamKey::Plain { .. } => None,
			ParamKey::Flagged { flag, .. } => Some(flag),
		}
	}
}
