//! REST, WebSocket and static-asset surface of the bridge.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use nowcast_core::{Envelope, MediaState};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::hub::{AppDebug, NowPlayingHub};

type AppState = Arc<NowPlayingHub>;

/// Build the bridge router. Static assets are the fallback when `public_dir`
/// is given.
pub fn router(hub: AppState, public_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/api/now", get(now_playing))
        .route("/api/debug/app", get(debug_app))
        .route("/ws", get(ws_upgrade))
        .with_state(hub);

    let app = match public_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}

async fn now_playing(State(hub): State<AppState>) -> Json<MediaState> {
    Json(hub.current().await.unwrap_or_default())
}

async fn debug_app(State(hub): State<AppState>) -> Json<AppDebug> {
    Json(hub.debug_app().await)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(hub): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (greeting, mut updates) = hub.subscribe().await;
    debug!(subscribers = hub.subscriber_count(), "overlay subscriber connected");

    if let Some(state) = greeting {
        if push(&mut sender, state).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(state) => {
                    if push(&mut sender, state).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "subscriber lagging; skipping to newer updates");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                // Clients have nothing to say; only watch for the close.
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("overlay subscriber disconnected");
}

async fn push(
    sender: &mut SplitSink<WebSocket, Message>,
    state: MediaState,
) -> Result<(), axum::Error> {
    match serde_json::to_string(&Envelope::now_playing(state)) {
        Ok(payload) => sender.send(Message::Text(payload.into())).await,
        Err(e) => {
            warn!(error = %e, "failed to encode now_playing envelope");
            Ok(())
        }
    }
}
