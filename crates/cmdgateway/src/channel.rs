// Message-oriented duplex channel carrying one execution session.
//
// The gateway reads a single inbound request and then only writes text
// notices. While output streams, the inbound side is watched solely for the
// peer going away.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
	#[error("connection closed by peer")]
	Closed,

	#[error("receive failed: {0}")]
	Receive(String),

	#[error("send failed: {0}")]
	Send(String),
}

/// Per-request duplex connection
#[async_trait]
pub trait MessageChannel: Send {
	/// Next data message (text or binary payload), skipping control frames
	async fn recv_message(&mut self) -> Result<Vec<u8>, ChannelError>;

	/// Resolves once the peer has gone away. Any data arriving in the
	/// meantime is discarded. Must be cancel safe.
	async fn closed(&mut self) -> ChannelError;

	/// Send one text notice
	async fn send_text(&mut self, text: String) -> Result<(), ChannelError>;

	/// Close the channel, ignoring errors
	async fn close(&mut self);
}

#[async_trait]
impl MessageChannel for WebSocket {
	async fn recv_message(&mut self) -> Result<Vec<u8>, ChannelError> {
		loop {
			match self.recv().await {
				Some(Ok(Message::Text(text))) => return Ok(text.as_str().as_bytes().to_vec()),
				Some(Ok(Message::Binary(bytes))) => return Ok(bytes.to_vec()),
				Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
				Some(Ok(Message::Close(_))) | None => return Err(ChannelError::Closed),
				Some(Err(e)) => return Err(ChannelError::Receive(e.to_string())),
			}
		}
	}

	async fn closed(&mut self) -> ChannelError {
		loop {
			match self.recv().await {
				Some(Ok(Message::Close(_))) | None => return ChannelError::Closed,
				Some(Err(e)) => return ChannelError::Receive(e.to_string()),
				Some(Ok(_)) => continue,
			}
		}
	}

	async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
		self.send(Message::Text(text.into()))
			.await
			.map_err(|e| ChannelError::Send(e.to_string()))
	}

	async fn close(&mut self) {
		let _ = self.send(Message::Close(None)).await;
	}
}
