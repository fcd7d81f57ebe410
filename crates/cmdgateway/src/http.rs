// HTTP surface: registry listing, WebSocket execution endpoint, static UI

use std::future::Future;
use std::path::Path;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::Method;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::gateway::Gateway;
use crate::registry::{Registry, RegistryStore};

pub const COMMANDS_PATH: &str = "/api/commands";
pub const EXECUTE_PATH: &str = "/ws/execute";

/// Build the application router
pub fn router(registry: RegistryStore, static_dir: &Path) -> Router {
	let listing = Router::new()
		.route(COMMANDS_PATH, get(list_commands))
		.layer(CorsLayer::new().allow_origin(Any).allow_methods([Method::GET]));

	Router::new()
		.route(EXECUTE_PATH, get(execute))
		.merge(listing)
		.fallback_service(ServeDir::new(static_dir))
		.with_state(Gateway::new(registry))
}

/// Serve `router` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
	F: Future<Output = ()> + Send + 'static,
{
	info!("Server started at http://{}", listener.local_addr()?);
	axum::serve(listener, router)
		.with_graceful_shutdown(shutdown)
		.await
}

async fn list_commands(State(gateway): State<Gateway>) -> Json<Registry> {
	Json(gateway.registry().get().source().clone())
}

async fn execute(
	State(gateway): State<Gateway>,
	ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
	let ws = match ws {
		Ok(ws) => ws,
		Err(rejection) => {
			warn!("Failed to upgrade to WebSocket: {}", rejection);
			return rejection.into_response();
		},
	};

	ws.on_failed_upgrade(|e| warn!("Failed to upgrade to WebSocket: {}", e))
		.on_upgrade(move |mut socket| async move {
			gateway.handle(&mut socket).await;
		})
}
