// Compiled registry ready for runtime use

use std::collections::HashMap;
use std::sync::Arc;

use super::error::RegistryError;
use super::types::{CommandSchema, ParamKey, ParamType, Registry};

/// Compiled registry ready for runtime use
#[derive(Debug)]
pub struct CompiledRegistry {
	/// Command name -> compiled command
	commands: HashMap<String, Arc<CompiledCommand>>,
	/// Original document, served verbatim by the listing endpoint
	source: Registry,
}

/// A command with its parameter keys parsed once at load time
#[derive(Debug)]
pub struct CompiledCommand {
	pub name: String,
	/// Parameters in declaration order
	pub params: Vec<CompiledParam>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledParam {
	pub key: ParamKey,
	pub param_type: ParamType,
}

impl CompiledRegistry {
	/// Compile a registry from its raw definition
	pub fn compile(registry: Registry) -> Result<Self, RegistryError> {
		let mut commands = HashMap::with_capacity(registry.len());
		for (name, schema) in registry.iter() {
			let compiled = CompiledCommand::compile(name, schema)?;
			commands.insert(name.clone(), Arc::new(compiled));
		}

		Ok(Self {
			commands,
			source: registry,
		})
	}

	/// Create an empty compiled registry
	pub fn empty() -> Self {
		Self {
			commands: HashMap::new(),
			source: Registry::new(),
		}
	}

	/// Look up a command by its exact name
	pub fn get_command(&self, name: &str) -> Option<&Arc<CompiledCommand>> {
		self.commands.get(name)
	}

	pub fn source(&self) -> &Registry {
		&self.source
	}

	pub fn len(&self) -> usize {
		self.commands.len()
	}

	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}
}

impl CompiledCommand {
	fn compile(name: &str, schema: &CommandSchema) -> Result<Self, RegistryError> {
		let params = schema
			.iter()
			.map(|(key, declared)| -> Result<CompiledParam, RegistryError> {
				let param_type =
					ParamType::from_declared(declared).ok_or_else(|| RegistryError::UnsupportedType {
						command: name.to_string(),
						key: key.clone(),
						declared: declared.clone(),
					})?;
				let key = ParamKey::parse(key)
					.map_err(|e| RegistryError::malformed_key(name, key.as_str(), e.reason()))?;
				Ok(CompiledParam { key, param_type })
			})
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Self {
			name: name.to_string(),
			params,
		})
	}
}
