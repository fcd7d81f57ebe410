// Gateway composition.
//
// One `Gateway::handle` call serves one connection:
//
//   AwaitRequest -> Validating -> Executing -> Streaming -> Completed
//         \______________\____________\____________\______> Errored
//
// Every failure is terminal for the session and reported to the caller
// once, as a text notice. Nothing is retried.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, MessageChannel};
use crate::registry::{ArgumentError, RegistryStore};
use crate::session::{ExitOutcome, Session, SessionError};

const SUCCESS_NOTICE: &str = "\nCommand execution completed successfully";

/// How long output is still forwarded after the process has exited. Pipes
/// inherited by a background child may never reach end of file.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// The single inbound message of a session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutionRequest {
	/// Registered command name (`cmd` is accepted for the bundled web client)
	#[serde(alias = "cmd")]
	pub command: String,
	#[serde(default)]
	pub args: HashMap<String, String>,
}

/// Per-session failures. The display text is the notice sent to the caller.
#[derive(Error, Debug)]
pub enum GatewayError {
	#[error("Failed to read command request")]
	MalformedRequest(String),

	#[error("Command not found")]
	UnknownCommand(String),

	#[error(transparent)]
	InvalidArguments(#[from] ArgumentError),

	#[error("Error starting command: {0}")]
	Spawn(#[source] SessionError),

	#[error("client disconnected: {0}")]
	StreamWrite(#[source] ChannelError),

	#[error("client went away: {0}")]
	PeerClosed(#[source] ChannelError),
}

impl GatewayError {
	/// Text to send to the caller, if the connection is still usable
	pub fn notice(&self) -> Option<String> {
		match self {
			GatewayError::StreamWrite(_) | GatewayError::PeerClosed(_) => None,
			other => Some(other.to_string()),
		}
	}
}

/// Lifecycle stage of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	AwaitRequest,
	Validating,
	Executing,
	Streaming,
	Completed,
	Errored,
}

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
	/// The process ran and the terminal notice was delivered
	Completed(ExitOutcome),
	/// The request was refused before or while starting the process
	Rejected(GatewayError),
	/// The client went away; the process was terminated
	Disconnected,
}

/// Tracks the stage of one connection for logging
struct Connection {
	id: u64,
	stage: Stage,
}

impl Connection {
	fn new() -> Self {
		Self {
			id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
			stage: Stage::AwaitRequest,
		}
	}

	fn enter(&mut self, stage: Stage) {
		debug!(connection = self.id, from = ?self.stage, to = ?stage, "session transition");
		self.stage = stage;
	}
}

/// Serves execution sessions against the shared registry
#[derive(Debug, Clone)]
pub struct Gateway {
	registry: RegistryStore,
}

impl Gateway {
	pub fn new(registry: RegistryStore) -> Self {
		Self { registry }
	}

	pub fn registry(&self) -> &RegistryStore {
		&self.registry
	}

	/// Serve one connection to completion and close it
	pub async fn handle<C: MessageChannel>(&self, channel: &mut C) -> SessionOutcome {
		let mut conn = Connection::new();

		let outcome = match self.start_session(&mut conn, channel).await {
			Ok(session) => self.stream(&mut conn, session, channel).await,
			Err(e) => {
				conn.enter(Stage::Errored);
				warn!(connection = conn.id, "session rejected: {}", e);
				if let Some(notice) = e.notice() {
					let _ = channel.send_text(notice).await;
				}
				SessionOutcome::Rejected(e)
			},
		};

		channel.close().await;
		outcome
	}

	async fn start_session<C: MessageChannel>(
		&self,
		conn: &mut Connection,
		channel: &mut C,
	) -> Result<Session, GatewayError> {
		let request = read_request(channel).await?;
		conn.enter(Stage::Validating);

		// The snapshot is pinned for the rest of validation; a concurrent
		// reload only affects later sessions.
		let snapshot = self.registry.get();
		let command = snapshot
			.get_command(&request.command)
			.ok_or_else(|| GatewayError::UnknownCommand(request.command.clone()))?;
		let args = command.build_args(&request.args)?;
		conn.enter(Stage::Executing);

		// The executable name always comes from the registry entry
		let session = Session::start(&command.name, args).map_err(GatewayError::Spawn)?;
		info!(connection = conn.id, command = %command.name, "session started");
		Ok(session)
	}

	async fn stream<C: MessageChannel>(
		&self,
		conn: &mut Connection,
		mut session: Session,
		channel: &mut C,
	) -> SessionOutcome {
		let echo = format!("Executing command: {}", session.invocation());
		if let Err(e) = channel.send_text(echo).await {
			return self.disconnect(conn, &mut session, GatewayError::StreamWrite(e)).await;
		}

		let mut pump = match session.spawn_pump() {
			Ok(pump) => pump,
			Err(e) => {
				session.terminate().await;
				conn.enter(Stage::Errored);
				return SessionOutcome::Rejected(GatewayError::Spawn(e));
			},
		};
		conn.enter(Stage::Streaming);

		// Forward output until the process exits, watching for the peer
		// going away even while the process is silent.
		let mut drained = false;
		let outcome = loop {
			tokio::select! {
				chunk = pump.next_chunk(), if !drained => match chunk {
					Some(chunk) => {
						if let Err(e) = channel.send_text(chunk).await {
							drop(pump);
							return self.disconnect(conn, &mut session, GatewayError::StreamWrite(e)).await;
						}
					},
					None => drained = true,
				},
				outcome = session.wait() => break outcome,
				e = channel.closed() => {
					drop(pump);
					return self.disconnect(conn, &mut session, GatewayError::PeerClosed(e)).await;
				},
			}
		};

		// The terminal notice follows whatever the pipes still hold, but
		// never waits on a descendant that kept them open.
		let grace = tokio::time::sleep(DRAIN_GRACE);
		tokio::pin!(grace);
		while !drained {
			tokio::select! {
				chunk = pump.next_chunk() => match chunk {
					Some(chunk) => {
						if let Err(e) = channel.send_text(chunk).await {
							warn!(connection = conn.id, "client disconnected after exit: {}", e);
							conn.enter(Stage::Errored);
							return SessionOutcome::Disconnected;
						}
					},
					None => drained = true,
				},
				_ = &mut grace => {
					debug!(connection = conn.id, "output still open after exit, not waiting for it");
					break;
				},
			}
		}
		drop(pump);

		let terminal = match &outcome {
			ExitOutcome::Success => SUCCESS_NOTICE.to_string(),
			ExitOutcome::Failure(details) => format!("\nCommand execution failed: {details}"),
		};
		if let Err(e) = channel.send_text(terminal).await {
			warn!(connection = conn.id, "failed to deliver terminal notice: {}", e);
			conn.enter(Stage::Errored);
			return SessionOutcome::Disconnected;
		}

		conn.enter(Stage::Completed);
		info!(connection = conn.id, command = session.command(), outcome = %outcome, "session completed");
		SessionOutcome::Completed(outcome)
	}

	async fn disconnect(&self, conn: &mut Connection, session: &mut Session, e: GatewayError) -> SessionOutcome {
		warn!(connection = conn.id, command = session.command(), "{}, terminating process", e);
		session.terminate().await;
		conn.enter(Stage::Errored);
		SessionOutcome::Disconnected
	}
}

async fn read_request<C: MessageChannel>(channel: &mut C) -> Result<ExecutionRequest, GatewayError> {
	let payload = channel
		.recv_message()
		.await
		.map_err(|e| GatewayError::MalformedRequest(e.to_string()))?;
	serde_json::from_slice(&payload).map_err(|e| GatewayError::MalformedRequest(e.to_string()))
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
