// End-to-end tests over the HTTP surface.
//
// The listing and static routes are driven through the router directly;
// execution sessions go through a real server and WebSocket client.

use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use cmdgateway::http::{COMMANDS_PATH, EXECUTE_PATH, router};
use cmdgateway::registry::{Registry, RegistryStore};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

async fn read_body(resp: axum::response::Response) -> Vec<u8> {
	axum::body::to_bytes(resp.into_body(), 1024 * 1024)
		.await
		.unwrap()
		.to_vec()
}

fn test_registry() -> Registry {
	Registry::new()
		.with_command("echo", [("msg", "string")])
		.with_command("head", [("count[-n]", "int"), ("file", "string")])
}

#[cfg(unix)]
fn shell_registry() -> Registry {
	Registry::new().with_command("sh", [("script[-c]", "string")])
}

async fn spawn_server(registry: Registry) -> anyhow::Result<SocketAddr> {
	let store = RegistryStore::from_registry(registry)?;
	let app = router(store, Path::new("./does-not-exist"));
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
	let addr = listener.local_addr()?;
	tokio::spawn(async move {
		let _ = axum::serve(listener, app).await;
	});
	Ok(addr)
}

/// Send one request and collect every text message until the server closes
async fn run_session(addr: SocketAddr, request: &str) -> anyhow::Result<Vec<String>> {
	let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{EXECUTE_PATH}")).await?;
	ws.send(Message::Text(request.into())).await?;

	let mut messages = Vec::new();
	while let Some(msg) = ws.next().await {
		match msg {
			Ok(Message::Text(text)) => messages.push(text.as_str().to_owned()),
			Ok(Message::Close(_)) | Err(_) => break,
			Ok(_) => {},
		}
	}
	Ok(messages)
}

#[tokio::test]
async fn test_listing_round_trip() -> anyhow::Result<()> {
	let registry = test_registry();
	let app = router(RegistryStore::from_registry(registry.clone())?, Path::new("."));

	let resp = app
		.oneshot(
			Request::builder()
				.uri(COMMANDS_PATH)
				.header(header::ORIGIN, "http://elsewhere.example")
				.body(Body::empty())?,
		)
		.await?;

	assert_eq!(resp.status(), StatusCode::OK);
	assert_eq!(
		resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
		"*"
	);
	let listed: Registry = serde_json::from_slice(&read_body(resp).await)?;
	assert_eq!(listed, registry);

	Ok(())
}

#[tokio::test]
async fn test_listing_follows_updates() -> anyhow::Result<()> {
	let store = RegistryStore::from_registry(test_registry())?;
	let app = router(store.clone(), Path::new("."));
	let updated = Registry::new().with_command("date", Vec::<(String, String)>::new());
	store.update(updated.clone())?;

	let resp = app
		.oneshot(Request::builder().uri(COMMANDS_PATH).body(Body::empty())?)
		.await?;
	let listed: Registry = serde_json::from_slice(&read_body(resp).await)?;
	assert_eq!(listed, updated);

	Ok(())
}

#[tokio::test]
async fn test_static_files() -> anyhow::Result<()> {
	let dir = tempfile::tempdir()?;
	std::fs::write(dir.path().join("index.html"), "<h1>commands</h1>")?;
	let app = router(RegistryStore::new(), dir.path());

	let resp = app
		.oneshot(Request::builder().uri("/").body(Body::empty())?)
		.await?;
	assert_eq!(resp.status(), StatusCode::OK);
	assert_eq!(read_body(resp).await, b"<h1>commands</h1>");

	Ok(())
}

#[tokio::test]
async fn test_execute_requires_upgrade() -> anyhow::Result<()> {
	let app = router(RegistryStore::new(), Path::new("."));
	let resp = app
		.oneshot(Request::builder().uri(EXECUTE_PATH).body(Body::empty())?)
		.await?;
	assert!(resp.status().is_client_error());
	Ok(())
}

#[tokio::test]
async fn test_ws_unknown_command() -> anyhow::Result<()> {
	let addr = spawn_server(test_registry()).await?;
	let messages = run_session(addr, r#"{"command": "rm", "args": {"path": "/"}}"#).await?;
	assert_eq!(messages, vec!["Command not found"]);
	Ok(())
}

#[tokio::test]
async fn test_ws_malformed_request() -> anyhow::Result<()> {
	let addr = spawn_server(test_registry()).await?;
	let messages = run_session(addr, "{\"command\": ").await?;
	assert_eq!(messages, vec!["Failed to read command request"]);
	Ok(())
}

#[tokio::test]
async fn test_ws_invalid_int() -> anyhow::Result<()> {
	let addr = spawn_server(test_registry()).await?;
	let messages =
		run_session(addr, r#"{"command": "head", "args": {"count[-n]": "x", "file": "a"}}"#).await?;
	assert_eq!(messages, vec!["Argument count[-n] must be an integer"]);
	Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_ws_echo_session() -> anyhow::Result<()> {
	let addr = spawn_server(test_registry()).await?;
	// the bundled web client sends `cmd`
	let messages = run_session(addr, r#"{"cmd": "echo", "args": {"msg": "hi"}}"#).await?;

	assert_eq!(messages.first().map(String::as_str), Some("Executing command: echo [hi]"));
	assert_eq!(
		messages.last().map(String::as_str),
		Some("\nCommand execution completed successfully")
	);
	assert_eq!(messages[1..messages.len() - 1].concat(), "hi\n");
	Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_ws_disconnect_terminates_silent_process() -> anyhow::Result<()> {
	let dir = tempfile::tempdir()?;
	let marker = dir.path().join("finished");
	let addr = spawn_server(shell_registry()).await?;

	let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{EXECUTE_PATH}")).await?;
	let request = serde_json::json!({
		"command": "sh",
		"args": {"script[-c]": format!("sleep 1; touch '{}'", marker.display())},
	});
	ws.send(Message::Text(request.to_string().into())).await?;

	match ws.next().await {
		Some(Ok(Message::Text(text))) => assert!(text.as_str().starts_with("Executing command: sh")),
		other => anyhow::bail!("expected the echo notice, got {other:?}"),
	}
	// gone without a close handshake while the process prints nothing
	drop(ws);

	tokio::time::sleep(Duration::from_secs(3)).await;
	assert!(!marker.exists(), "process kept running after the client left");
	Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_ws_terminal_notice_after_exit_with_background_child() -> anyhow::Result<()> {
	let addr = spawn_server(shell_registry()).await?;
	let started = Instant::now();

	let messages = run_session(
		addr,
		r#"{"command": "sh", "args": {"script[-c]": "sleep 5 & echo hi"}}"#,
	)
	.await?;

	assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
	assert_eq!(
		messages.last().map(String::as_str),
		Some("\nCommand execution completed successfully")
	);
	assert!(messages.concat().contains("hi\n"));
	Ok(())
}
