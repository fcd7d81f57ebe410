// Remote command-execution gateway
//
// Exposes an operator-defined registry of commands over HTTP. Clients pick
// a command by name over a WebSocket, parameters are validated against the
// registry schema, and the process output is streamed back as it is
// produced.

pub mod channel;
pub mod config;
pub mod gateway;
pub mod http;
pub mod registry;
pub mod session;

pub use config::GatewayConfig;
pub use gateway::{ExecutionRequest, Gateway, GatewayError, SessionOutcome};
pub use registry::{Registry, RegistryClient, RegistryError, RegistryStore};
pub use session::{ExitOutcome, Session};
