//! WebSocket handler — request dispatch and page push relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch to the coordinator
//! - Pushes queued for this connection's page → forward to client
//!
//! A connection becomes a page once it sends `attachPage`; its client ID is
//! then the page ID the coordinator pushes to. Control surfaces simply never
//! attach.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `connected` with `clientId`
//! 2. Client sends frames → dispatch → exactly one `state` or `error` reply
//! 3. Coordinator pushes arrive on the page queue → forwarded as `push`
//! 4. Close → detach page (if any) from the registry

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use policy::{ClientFrame, ErrorCode, Policy, Request, ServerFrame};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::coordinator::CoordinatorError;
use crate::state::AppState;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
enum WsError {
    #[error("invalid frame: {0}")]
    BadFrame(#[from] serde_json::Error),
    #[error("connection has no attached page")]
    NotAPage,
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
}

impl ErrorCode for WsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadFrame(_) => "E_BAD_FRAME",
            Self::NotAPage => "E_NOT_A_PAGE",
            Self::Coordinator(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::BadFrame(_) | Self::NotAPage => false,
            Self::Coordinator(e) => e.retryable(),
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Per-connection state threaded through dispatch.
struct Session {
    client_id: Uuid,
    attached: bool,
    /// Clone handed to the registry when this connection attaches a page.
    page_tx: mpsc::Sender<ServerFrame>,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    let (page_tx, mut page_rx) = mpsc::channel::<ServerFrame>(state.page_queue_capacity);

    if send_frame(&mut socket, &ServerFrame::Connected { client_id }).await.is_err() {
        return;
    }
    info!(%client_id, "ws: client connected");

    let mut session = Session { client_id, attached: false, page_tx };

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let reply = process_inbound_text(&state, &mut session, &text).await;
                        if send_frame(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = page_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    if session.attached {
        state.pages.detach(client_id).await;
    }
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return the reply for the
/// sender. Kept apart from the socket so tests can drive dispatch directly.
async fn process_inbound_text(state: &AppState, session: &mut Session, text: &str) -> ServerFrame {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(client_id = %session.client_id, error = %e, "ws: invalid inbound frame");
            return ServerFrame::error_from(recover_frame_id(text), &WsError::from(e));
        }
    };

    info!(
        client_id = %session.client_id,
        id = %frame.id,
        action = frame.request.action(),
        mutation = frame.request.is_mutation(),
        "ws: recv frame"
    );

    match dispatch(state, session, frame.request).await {
        Ok(policy) => ServerFrame::State { parent_id: frame.id, state: policy },
        Err(e) => ServerFrame::error_from(Some(frame.id), &e),
    }
}

async fn dispatch(state: &AppState, session: &mut Session, request: Request) -> Result<Policy, WsError> {
    let coordinator = &state.coordinator;
    let policy = match request {
        Request::GetState => coordinator.get_policy().await?,
        Request::SetGlobalEnabled { enabled } => coordinator.set_global(enabled).await?,
        Request::SetSiteEnabled { hostname, enabled: Some(enabled) } => {
            coordinator.set_site_override(&hostname, enabled).await?
        }
        Request::SetSiteEnabled { hostname, enabled: None } | Request::RemoveSiteSetting { hostname } => {
            coordinator.clear_site_override(&hostname).await?
        }
        Request::AttachPage { url, looks_dark } => {
            state.pages.attach(session.client_id, &url, looks_dark, session.page_tx.clone()).await;
            session.attached = true;
            coordinator.page_attached(session.client_id).await?
        }
        Request::DetachPage => {
            if !session.attached {
                return Err(WsError::NotAPage);
            }
            state.pages.detach(session.client_id).await;
            session.attached = false;
            coordinator.get_policy().await?
        }
    };
    Ok(policy)
}

/// Best-effort correlation id from a frame that failed to parse.
fn recover_frame_id(text: &str) -> Option<Uuid> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    value.get("id")?.as_str()?.parse().ok()
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    match frame {
        ServerFrame::Error { parent_id, code, message, .. } => {
            warn!(parent_id = ?parent_id, code = code.as_str(), message = message.as_str(), "ws: send frame type=error");
        }
        ServerFrame::Push { action } => info!(?action, "ws: send push"),
        ServerFrame::Connected { .. } | ServerFrame::State { .. } => {
            info!(parent_id = ?frame.parent_id(), "ws: send frame");
        }
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
