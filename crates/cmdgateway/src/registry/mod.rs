// Command Registry Module
//
// The registry is the security boundary of the gateway:
// - Only commands named in the registry can be launched
// - Flag tokens only come from schema keys, never from callers
// - Hot-reloadable from a polled file, swapped atomically

mod client;
mod compiled;
mod error;
mod store;
mod types;
mod validation;

pub use client::{RegistryClient, parse_duration};
pub use compiled::{CompiledCommand, CompiledParam, CompiledRegistry};
pub use error::RegistryError;
pub use store::{ModTimeTracker, RegistryStore};
pub use types::{CommandSchema, KeyError, ParamKey, ParamType, Registry};
pub use validation::ArgumentError;
