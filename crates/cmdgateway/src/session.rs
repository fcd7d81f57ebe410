// Execution session.
//
// A `Session` owns one subprocess: it is started with an argument vector
// built from the registry, its stdout and stderr are pumped concurrently by
// a single background task into a bounded channel, and its exit status is
// classified into an `ExitOutcome`.
//
// The child is spawned with kill-on-drop, so dropping a session on any
// path (including a cancelled task) never leaves the process orphaned.

use std::fmt;
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Maximum number of bytes read from a stream per chunk
const CHUNK_SIZE: usize = 1024;

/// Chunks buffered between the pump task and the session owner. A slow
/// client eventually blocks the pump, which in turn blocks the child.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum SessionError {
	#[error("{0}")]
	Spawn(#[source] std::io::Error),

	#[error("output streams already taken")]
	StreamsTaken,
}

/// How the process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
	Success,
	Failure(String),
}

impl ExitOutcome {
	pub fn from_status(status: ExitStatus) -> Self {
		if status.success() {
			return ExitOutcome::Success;
		}
		if let Some(code) = status.code() {
			return ExitOutcome::Failure(format!("exit status {code}"));
		}
		#[cfg(unix)]
		{
			use std::os::unix::process::ExitStatusExt;
			if let Some(signal) = status.signal() {
				return ExitOutcome::Failure(format!("signal: {signal}"));
			}
		}
		ExitOutcome::Failure(status.to_string())
	}

	pub fn is_success(&self) -> bool {
		matches!(self, ExitOutcome::Success)
	}
}

impl fmt::Display for ExitOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ExitOutcome::Success => f.write_str("success"),
			ExitOutcome::Failure(details) => f.write_str(details),
		}
	}
}

/// A running subprocess
#[derive(Debug)]
pub struct Session {
	command: String,
	args: Vec<String>,
	child: Child,
}

impl Session {
	/// Launch `command` with `args`. Does not wait for completion.
	pub fn start(command: &str, args: Vec<String>) -> Result<Self, SessionError> {
		let child = Command::new(command)
			.args(&args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(SessionError::Spawn)?;

		debug!(command, pid = ?child.id(), "spawned process");
		Ok(Self {
			command: command.to_string(),
			args,
			child,
		})
	}

	pub fn command(&self) -> &str {
		&self.command
	}

	pub fn args(&self) -> &[String] {
		&self.args
	}

	/// The command line as echoed to the caller: `name [arg1 arg2]`
	pub fn invocation(&self) -> String {
		format!("{} [{}]", self.command, self.args.join(" "))
	}

	/// Take both output streams and start the pump task
	pub fn spawn_pump(&mut self) -> Result<OutputPump, SessionError> {
		let stdout = self.child.stdout.take().ok_or(SessionError::StreamsTaken)?;
		let stderr = self.child.stderr.take().ok_or(SessionError::StreamsTaken)?;
		Ok(OutputPump::spawn(stdout, stderr))
	}

	/// Wait for the process to exit
	pub async fn wait(&mut self) -> ExitOutcome {
		match self.child.wait().await {
			Ok(status) => ExitOutcome::from_status(status),
			Err(e) => ExitOutcome::Failure(e.to_string()),
		}
	}

	/// Kill the process and reap it
	pub async fn terminate(&mut self) {
		if let Err(e) = self.child.kill().await {
			warn!(command = %self.command, "failed to kill process: {}", e);
		}
	}
}

/// Receiving end of the pump task.
///
/// Yields decoded output chunks from both streams until both reach
/// end-of-input. Dropping it aborts the pump task.
#[derive(Debug)]
pub struct OutputPump {
	rx: mpsc::Receiver<String>,
	task: JoinHandle<()>,
}

impl OutputPump {
	/// Spawn a task reading both streams concurrently
	pub fn spawn<O, E>(stdout: O, stderr: E) -> Self
	where
		O: AsyncRead + Unpin + Send + 'static,
		E: AsyncRead + Unpin + Send + 'static,
	{
		let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
		let task = tokio::spawn(async move {
			tokio::join!(
				forward(stdout, tx.clone(), "stdout"),
				forward(stderr, tx, "stderr")
			);
		});
		Self { rx, task }
	}

	/// Next chunk of output, or None once both streams are exhausted
	pub async fn next_chunk(&mut self) -> Option<String> {
		self.rx.recv().await
	}
}

impl Drop for OutputPump {
	fn drop(&mut self) {
		self.task.abort();
	}
}

async fn forward<R>(mut reader: R, tx: mpsc::Sender<String>, stream: &'static str)
where
	R: AsyncRead + Unpin,
{
	let mut buf = [0u8; CHUNK_SIZE];
	let mut decoder = Utf8Chunker::default();

	loop {
		let n = match reader.read(&mut buf).await {
			Ok(0) => break,
			Ok(n) => n,
			Err(e) => {
				warn!(stream, "failed to read process output: {}", e);
				break;
			},
		};
		let text = decoder.push(&buf[..n]);
		if !text.is_empty() && tx.send(text).await.is_err() {
			// receiver gone, nobody wants the rest
			return;
		}
	}

	let rest = decoder.finish();
	if !rest.is_empty() {
		let _ = tx.send(rest).await;
	}
}

/// Incremental UTF-8 decoder that holds back a multi-byte sequence split
/// across reads. Invalid bytes are replaced with U+FFFD.
#[derive(Debug, Default)]
struct Utf8Chunker {
	pending: Vec<u8>,
}

impl Utf8Chunker {
	fn push(&mut self, bytes: &[u8]) -> String {
		self.pending.extend_from_slice(bytes);

		let mut out = String::with_capacity(self.pending.len());
		let mut rest = self.pending.as_slice();
		loop {
			match std::str::from_utf8(rest) {
				Ok(valid) => {
					out.push_str(valid);
					rest = &[];
					break;
				},
				Err(e) => {
					let (valid, after) = rest.split_at(e.valid_up_to());
					out.push_str(&String::from_utf8_lossy(valid));
					match e.error_len() {
						Some(len) => {
							out.push(char::REPLACEMENT_CHARACTER);
							rest = &after[len..];
						},
						None => {
							rest = after;
							break;
						},
					}
				},
			}
		}

		let consumed = self.pending.len() - rest.len();
		self.pending.drain(..consumed);
		out
	}

	fn finish(&mut self) -> String {
		let rest = String::from_utf8_lossy(&self.pending).into_owned();
		self.pending.clear();
		rest
	}
}
