//! HTTP router and server lifecycle.
//!
//! One listener serves both the browser client and the WebSocket endpoint:
//!
//! - `GET /ws` with a WebSocket upgrade becomes a bridge session.
//! - `/` serves the index document; any other path is looked up in the web
//!   root.
//!
//! Upgraded sessions run in a `JoinSet` owned by the server rather than as
//! detached tasks.  When the shared `running` flag is cleared the server
//! stops accepting, aborts the remaining sessions (each aborted session drops
//! its device handle, which closes the MIDI port) and gives plain HTTP
//! connections [`SHUTDOWN_GRACE`] to finish.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::application::{ConnectionBridge, DeviceRegistry, MidiBackend};
use crate::domain::config::BridgeConfig;
use crate::infrastructure::ws_transport::WebSocketTransport;

/// Path of the WebSocket endpoint.
pub const WS_PATH: &str = "/ws";

/// How often the server re-checks the `running` flag.
const STOP_POLL: Duration = Duration::from_millis(200);

/// How long open HTTP connections may keep the server alive after shutdown
/// is requested.  Idle sockets that never send a request are dropped once
/// it runs out.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// State shared by every request handler.
#[derive(Clone)]
struct AppState {
    config: Arc<BridgeConfig>,
    registry: Arc<DeviceRegistry>,
    sessions: Arc<Mutex<JoinSet<()>>>,
    running: Arc<AtomicBool>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound (port in use, no
/// permission).
pub async fn run_server(
    config: BridgeConfig,
    backend: Arc<dyn MidiBackend>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.bind_addr))?;

    info!(
        "IsoKey bridge listening on http://{} (WebSocket at {WS_PATH})",
        config.bind_addr
    );

    serve(
        listener,
        Arc::new(config),
        Arc::new(DeviceRegistry::new(backend)),
        running,
    )
    .await
}

/// Serves on an already bound listener until `running` is cleared.
///
/// Split from [`run_server`] so tests can bind `127.0.0.1:0` and learn the
/// port before serving.
///
/// # Errors
///
/// Returns an error if the HTTP server itself fails.
pub async fn serve(
    listener: TcpListener,
    config: Arc<BridgeConfig>,
    registry: Arc<DeviceRegistry>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let state = AppState {
        config,
        registry,
        sessions: Arc::new(Mutex::new(JoinSet::new())),
        running: Arc::clone(&running),
    };
    let app = router(state.clone()).into_make_service_with_connect_info::<SocketAddr>();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(stop_requested(Arc::clone(&running)))
        .into_future();
    let mut server = tokio::spawn(server);

    tokio::select! {
        joined = &mut server => {
            return joined
                .context("HTTP server task failed")?
                .context("HTTP server stopped unexpectedly");
        }
        () = stop_requested(running) => {}
    }

    let mut sessions = state.sessions.lock().await;
    info!(
        "shutdown flag set; closing {} open session(s)",
        sessions.len()
    );
    sessions.shutdown().await;
    drop(sessions);

    match timeout(SHUTDOWN_GRACE, &mut server).await {
        Ok(joined) => joined
            .context("HTTP server task failed")?
            .context("HTTP server failed during shutdown"),
        Err(_) => {
            warn!("HTTP connections still open after {SHUTDOWN_GRACE:?}; dropping them");
            server.abort();
            Ok(())
        }
    }
}

// ── Routing ───────────────────────────────────────────────────────────────────

fn router(state: AppState) -> Router {
    let web_root = &state.config.web_root;
    let index = ServeFile::new(web_root.join(&state.config.index_file));
    let files = ServeDir::new(web_root).append_index_html_on_directories(false);

    Router::new()
        .route(WS_PATH, get(upgrade_session))
        .route_service("/", index)
        .fallback_service(files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn stop_requested(running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(STOP_POLL).await;
    }
}

// ── Sessions ──────────────────────────────────────────────────────────────────

/// Completes the upgrade and hands the socket to a tracked session task.
async fn upgrade_session(
    upgrade: WebSocketUpgrade,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    upgrade.on_upgrade(move |socket| async move {
        let mut sessions = state.sessions.lock().await;
        if !state.running.load(Ordering::Relaxed) {
            debug!("connection {peer_addr}: upgraded during shutdown, dropping");
            return;
        }
        reap_finished(&mut sessions);
        sessions.spawn(run_session(
            socket,
            peer_addr,
            Arc::clone(&state.config),
            Arc::clone(&state.registry),
        ));
    })
}

async fn run_session(
    socket: WebSocket,
    peer_addr: SocketAddr,
    config: Arc<BridgeConfig>,
    registry: Arc<DeviceRegistry>,
) {
    let bridge = ConnectionBridge::new(
        WebSocketTransport::from_socket(socket),
        peer_addr.to_string(),
        config.midi_channel,
        config.preferred_output_name(),
    );
    let report = bridge.run(&registry).await;
    debug!("connection {peer_addr}: session {} finished", report.session_id);
}

fn reap_finished(sessions: &mut JoinSet<()>) {
    while let Some(result) = sessions.try_join_next() {
        if let Err(e) = result {
            if e.is_panic() {
                error!("session task panicked: {e}");
            }
        }
    }
}
