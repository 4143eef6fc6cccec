//! WebSocket upgrade and per-socket message loop (spec.md §4.C, §6).
//!
//! Grounded on the teacher's `ws.rs` split-sink/spawned-writer/read-loop
//! shape, generalised from the teacher's length-prefixed MessagePack frames
//! to the spec's JSON text frames, and from a single flat room map to the
//! registry's short-code → (room, endpoint) resolution.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Path, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use oc_core::net::{ClientFrame, ServerFrame};

use crate::auth::{cookie_from_headers, Session};
use crate::room::{Socket, SocketId};
use crate::state::{AppState, ConnectionGuard, IpConnectionGuard};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some((room, endpoint_override)) = state.rooms.lock().await.resolve(&code) else {
        return axum::http::StatusCode::NOT_FOUND.into_response();
    };

    let Some(ip_guard) = IpConnectionGuard::try_acquire(addr.ip(), state.ws_per_ip.clone(), state.config.limits.max_ws_per_ip) else {
        return axum::http::StatusCode::TOO_MANY_REQUESTS.into_response();
    };

    let cookie = cookie_from_headers(&headers);
    let session = state.sessions.get_or_create(cookie.as_deref()).await;
    state.sessions.put(session.clone()).await;

    let endpoint_name = {
        let room = room.lock().await;
        match &endpoint_override {
            Some(code) => room
                .endpoints
                .values()
                .find(|e| e.code == *code)
                .map(|e| e.name.clone())
                .unwrap_or_else(|| room.default_endpoint.clone()),
            None => room.starting_endpoint.clone(),
        }
    };

    let recv_timeout = Duration::from_secs(state.config.limits.socket_recv_timeout_secs);
    let heartbeat = Duration::from_secs(state.config.limits.socket_heartbeat_secs);
    let conn_counter = state.ws_connection_count.clone();

    ws.on_upgrade(move |socket| async move {
        let _conn_guard = ConnectionGuard::new(conn_counter);
        let _ip_guard = ip_guard;
        handle_socket(socket, state, room, endpoint_name, session, addr, recv_timeout, heartbeat).await;
    })
    .into_response()
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    room: crate::room_manager::SharedRoom,
    endpoint_name: String,
    session: Session,
    addr: SocketAddr,
    recv_timeout: Duration,
    heartbeat: Duration,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();
    let socket_id: SocketId = Uuid::new_v4();

    {
        let mut room = room.lock().await;
        room.add_socket(
            &endpoint_name,
            Socket {
                id: socket_id,
                session: session.clone(),
                remote_addr: addr.ip(),
                tx: tx.clone(),
            },
        );
        room.ping();
    }

    // Initial bootstrap frame (spec.md §4.C "on_join returns a synchronous
    // initial payload"). Everyone gets `setup`; the default endpoint is
    // additionally told about every sibling endpoint's code.
    let is_default = {
        let room = room.lock().await;
        room.default_endpoint == endpoint_name
    };
    let _ = tx.send(ServerFrame::Setup(serde_json::json!({"endpoint": endpoint_name})));
    if is_default {
        let descriptors = room.lock().await.endpoint_descriptors();
        let _ = tx.send(ServerFrame::Endpoints(descriptors));
    }
    {
        let mut room = room.lock().await;
        room.fanout();
    }

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else { continue };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        let next = tokio::time::timeout(recv_timeout.max(heartbeat), ws_receiver.next()).await;
        let Ok(Some(Ok(msg))) = next else { break };

        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => continue,
        };

        room.lock().await.ping();

        let frame: Result<ClientFrame, _> = serde_json::from_str(&text);
        let Ok(frame) = frame else {
            let _ = tx.send(ServerFrame::Error {
                message: "malformed frame".to_string(),
                exception: None,
            });
            continue;
        };

        let outcome = {
            let mut room = room.lock().await;
            room.handle_command(&endpoint_name, socket_id, &session, &frame.cmd, &frame.args).await
        };

        match outcome {
            Ok(true) => room.lock().await.fanout(),
            Ok(false) => {},
            Err(err) => {
                let _ = tx.send(ServerFrame::Error {
                    message: err.to_string(),
                    exception: None,
                });
            },
        }
    }

    writer.abort();
    {
        let mut room = room.lock().await;
        room.remove_socket(&endpoint_name, socket_id);
        room.fanout();
    }
    info!(socket = %socket_id, endpoint = %endpoint_name, "socket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn cookie_from_headers_extracts_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::COOKIE, HeaderValue::from_static("other=1; oc_session=abc-123; foo=bar"));
        assert_eq!(cookie_from_headers(&headers), Some("abc-123".to_string()));
    }

    #[test]
    fn cookie_from_headers_absent_is_none() {
        let headers = HeaderMap::new();
        assert_eq!(cookie_from_headers(&headers), None);
    }
}
