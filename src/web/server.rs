//! Axum HTTP gate serving the unlock prompt.
//!
//! Routes:
//! - `GET /unlock`: password form.
//! - `POST /unlock`: unlock attempt; responds with the starting page, the
//!   wrong-password page, or a plain unexpected-error response.
//! - `GET /public/style.css`: embedded stylesheet.
//! - `GET /api/status`: JSON lock state.
//! - anything else: redirect to the form while locked, starting page once
//!   unlocked.
//!
//! Pages are embedded at compile time; there is nothing to deploy next to
//! the binary.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Form, Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tokio::task::AbortHandle;
use tokio::time::{Duration, timeout};

use crate::error::GateError;
use crate::launcher::{CloseError, Listener, LockState, UnlockManager, UnlockOutcome};

/// How long a single close attempt waits for the serve task to finish
/// before reporting failure to the drain retry loop.
const CLOSE_WAIT: Duration = Duration::from_secs(1);

/// Shared state for the gate handlers.
struct GateState {
    manager: Arc<UnlockManager>,
    health_check_url: Option<String>,
}

/// Bind the gate and start serving.
///
/// Returns the actual bound address (useful when binding to port 0) and the
/// [`GateServer`] handle the drain sequencer retires after unlock.
pub async fn start_server(
    addr: SocketAddr,
    manager: Arc<UnlockManager>,
    health_check_url: Option<String>,
) -> Result<(SocketAddr, GateServer), GateError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| GateError::Bind { addr, source })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|source| GateError::Bind { addr, source })?;

    let state = Arc::new(GateState {
        manager,
        health_check_url,
    });

    let app = Router::new()
        .route("/unlock", get(unlock_page).post(submit_password))
        .route("/public/style.css", get(css_handler))
        .route("/api/status", get(status_handler))
        .fallback(fallback_handler)
        .with_state(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (finished_tx, finished_rx) = watch::channel(false);

    let serve_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
        {
            tracing::error!("unlock gate server error: {}", e);
        }
    });
    let abort = serve_task.abort_handle();

    // Watcher sets the finished flag however the serve task ends, including
    // abort, so close attempts can observe it repeatedly.
    tokio::spawn(async move {
        let _ = serve_task.await;
        let _ = finished_tx.send(true);
    });

    Ok((
        bound_addr,
        GateServer {
            shutdown: Mutex::new(Some(shutdown_tx)),
            abort,
            finished: finished_rx,
        },
    ))
}

/// Handle to the spawned serve task, implementing the close protocol the
/// drain sequencer drives.
pub struct GateServer {
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    abort: AbortHandle,
    finished: watch::Receiver<bool>,
}

#[async_trait]
impl Listener for GateServer {
    fn abort_connections(&self) {
        // Stop accepting, then sever whatever is still open. Both are
        // idempotent, so the retry loop may call this freely.
        if let Some(tx) = self.shutdown.lock().expect("shutdown mutex").take() {
            let _ = tx.send(());
        }
        self.abort.abort();
    }

    async fn close(&self) -> Result<(), CloseError> {
        let mut finished = self.finished.clone();
        match timeout(CLOSE_WAIT, finished.wait_for(|done| *done)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(CloseError("server watcher dropped".into())),
            Err(_) => Err(CloseError("server has not finished shutting down".into())),
        }
    }
}

// --- Handlers ---

async fn unlock_page() -> Html<&'static str> {
    Html(include_str!("static/unlock.html"))
}

async fn css_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css")],
        include_str!("static/style.css"),
    )
}

#[derive(Deserialize)]
struct UnlockForm {
    password: String,
}

async fn submit_password(
    State(state): State<Arc<GateState>>,
    Form(form): Form<UnlockForm>,
) -> Response {
    match state.manager.submit(SecretString::from(form.password)).await {
        UnlockOutcome::Unlocked | UnlockOutcome::AlreadyUnlocked => {
            starting_page(&state).into_response()
        }
        UnlockOutcome::WrongPassword => {
            (StatusCode::UNAUTHORIZED, Html(include_str!("static/error.html"))).into_response()
        }
        UnlockOutcome::Failed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "An unexpected error occurred.",
        )
            .into_response(),
    }
}

#[derive(Serialize)]
struct StatusResponse {
    state: &'static str,
}

async fn status_handler(State(state): State<Arc<GateState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        state: state.manager.state().as_str(),
    })
}

async fn fallback_handler(State(state): State<Arc<GateState>>) -> Response {
    match state.manager.state() {
        LockState::Locked | LockState::Unlocking => Redirect::to("/unlock").into_response(),
        _ => starting_page(&state).into_response(),
    }
}

fn starting_page(state: &GateState) -> Html<String> {
    let url = state.health_check_url.as_deref().unwrap_or("/");
    Html(include_str!("static/starting.html").replace("{{health_check_url}}", &html_escape(url)))
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
