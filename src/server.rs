/*
 * This file is part of raphael-biometrics.
 *
 * Copyright (C) 2026 raphael-biometrics contributors
 *
 * raphael-biometrics is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * raphael-biometrics is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with raphael-biometrics. If not, see <https://www.gnu.org/licenses/>.
 */

//! Unix socket front end
//!
//! Exposes the bridge to a host process as newline-delimited JSON.
//!
//! - every request line is answered by exactly one `response` line
//! - after `SetNotify`, driver callbacks arrive on the same connection as
//!   `event` lines, interleaved with responses
//! - driver calls run on the blocking pool so a slow vendor library never
//!   stalls the accept loop
//! - each connection has a bounded outgoing queue; when a client stops
//!   reading, its callbacks fail with `QueueFull` instead of blocking the
//!   driver thread

use std::future::Future;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rp_error::{RaphaelError, Result};
use rp_protocol::{
    ClientEvent, FingerprintAcquiredInfo, FingerprintError, Request, RequestEnvelope, Response, ResponseData,
    ResponseEnvelope, ServerMessage, AUTH_TOKEN_LEN, MAX_MESSAGE_SIZE,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::bridge::BiometricsFingerprint;
use crate::callback::{CallbackError, ClientCallback};
use crate::constants::server::{EVENT_QUEUE_DEPTH, MAX_CONNECTIONS, SOCKET_MODE, WRITE_TIMEOUT};

// ============================================================================
// Callback sink
// ============================================================================

/// Client callback that queues events for one socket connection
pub struct SocketCallback {
    events: mpsc::Sender<ServerMessage>,
}

impl SocketCallback {
    pub fn new(events: mpsc::Sender<ServerMessage>) -> Self {
        Self { events }
    }

    fn push(&self, event: ClientEvent) -> std::result::Result<(), CallbackError> {
        self.events.try_send(ServerMessage::Event(event)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => CallbackError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => CallbackError::Disconnected,
        })
    }
}

impl ClientCallback for SocketCallback {
    fn on_error(&self, device_id: u64, error: FingerprintError, vendor_code: i32) -> std::result::Result<(), CallbackError> {
        self.push(ClientEvent::Error { device_id, error, vendor_code })
    }

    fn on_acquired(
        &self,
        device_id: u64,
        acquired_info: FingerprintAcquiredInfo,
        vendor_code: i32,
    ) -> std::result::Result<(), CallbackError> {
        self.push(ClientEvent::Acquired { device_id, acquired_info, vendor_code })
    }

    fn on_enroll_result(
        &self,
        device_id: u64,
        finger_id: u32,
        group_id: u32,
        remaining: u32,
    ) -> std::result::Result<(), CallbackError> {
        self.push(ClientEvent::EnrollResult { device_id, finger_id, group_id, remaining })
    }

    fn on_removed(
        &self,
        device_id: u64,
        finger_id: u32,
        group_id: u32,
        remaining: u32,
    ) -> std::result::Result<(), CallbackError> {
        self.push(ClientEvent::Removed { device_id, finger_id, group_id, remaining })
    }

    fn on_authenticated(
        &self,
        device_id: u64,
        finger_id: u32,
        group_id: u32,
        token: &[u8],
    ) -> std::result::Result<(), CallbackError> {
        self.push(ClientEvent::Authenticated { device_id, finger_id, group_id, token: token.to_vec() })
    }

    fn on_enumerate(
        &self,
        device_id: u64,
        finger_id: u32,
        group_id: u32,
        remaining: u32,
    ) -> std::result::Result<(), CallbackError> {
        self.push(ClientEvent::Enumerate { device_id, finger_id, group_id, remaining })
    }
}

// ============================================================================
// Listener
// ============================================================================

/// Bind `socket_path`, replacing a stale socket but never a symlink.
pub fn bind_socket(socket_path: &Path) -> Result<UnixListener> {
    if let Ok(metadata) = socket_path.symlink_metadata() {
        if metadata.file_type().is_symlink() {
            return Err(RaphaelError::invalid_path(socket_path, "socket path is a symlink"));
        }
        std::fs::remove_file(socket_path)?;
        debug!("Removed existing socket file");
    }

    let listener = UnixListener::bind(socket_path)?;
    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))?;
    info!("Listening on {} (mode {:o})", socket_path.display(), SOCKET_MODE);
    Ok(listener)
}

/// Serve until SIGINT or SIGTERM, then remove the socket.
pub async fn run_server(socket_path: &Path, bridge: Arc<BiometricsFingerprint>) -> Result<()> {
    let listener = bind_socket(socket_path)?;

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
            _ = sigterm.recv() => info!("SIGTERM received"),
        }
    };

    serve(listener, bridge, shutdown).await;

    let _ = std::fs::remove_file(socket_path);
    info!("Server stopped");
    Ok(())
}

/// Accept connections on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: UnixListener, bridge: Arc<BiometricsFingerprint>, shutdown: F)
where
    F: Future<Output = ()>,
{
    let active = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let current = active.load(Ordering::SeqCst);
                        if current >= MAX_CONNECTIONS {
                            warn!("Connection limit reached ({}), rejecting new connection", current);
                            drop(stream);
                            continue;
                        }

                        active.fetch_add(1, Ordering::SeqCst);
                        let active = active.clone();
                        let bridge = bridge.clone();
                        tokio::spawn(async move {
                            handle_client(stream, bridge).await;
                            active.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                    Err(e) => error!("Accept error: {}", e),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }
}

// ============================================================================
// Connections
// ============================================================================

async fn read_line_bounded<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    out: &mut Vec<u8>,
    max_len: usize,
) -> std::io::Result<usize> {
    out.clear();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(0);
        }

        let mut take_len = available.len();
        let mut found_newline = false;
        if let Some(pos) = available.iter().position(|b| *b == b'\n') {
            take_len = pos + 1;
            found_newline = true;
        }

        let remaining = max_len.saturating_sub(out.len());
        if take_len > remaining {
            let consume_len = remaining.min(available.len());
            reader.consume(consume_len);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "Message too large"));
        }

        out.extend_from_slice(&available[..take_len]);
        reader.consume(take_len);

        if found_newline {
            return Ok(out.len());
        }
    }
}

/// State of one client connection
struct Session {
    outgoing: mpsc::Sender<ServerMessage>,
    callback: Option<Arc<dyn ClientCallback>>,
}

async fn handle_client(stream: UnixStream, bridge: Arc<BiometricsFingerprint>) {
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let (outgoing, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let writer_task = tokio::spawn(write_messages(writer, rx));

    let mut session = Session { outgoing, callback: None };
    let mut line: Vec<u8> = Vec::with_capacity(MAX_MESSAGE_SIZE);
    let mut request_count: u64 = 0;

    loop {
        match read_line_bounded(&mut reader, &mut line, MAX_MESSAGE_SIZE).await {
            Ok(0) => {
                debug!("Client disconnected after {} requests", request_count);
                break;
            }
            Ok(n) => {
                request_count += 1;
                trace!("Request #{}: {} bytes", request_count, n);
                let response = process_request(&line, &bridge, &mut session).await;
                if session.outgoing.send(ServerMessage::Response(response)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                if e.kind() == std::io::ErrorKind::InvalidData {
                    warn!("Message too large (>{} bytes)", MAX_MESSAGE_SIZE);
                    let envelope = ResponseEnvelope::new(0, Response::error("Message too large"));
                    let _ = session.outgoing.send(ServerMessage::Response(envelope)).await;
                } else {
                    error!("Read error: {}", e);
                }
                break;
            }
        }
    }

    if let Some(callback) = session.callback.take() {
        bridge.clear_notify(&callback);
    }
    drop(session);
    let _ = writer_task.await;
}

async fn write_messages(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<ServerMessage>) {
    while let Some(message) = rx.recv().await {
        let mut json = match serde_json::to_vec(&message) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize message: {}", e);
                continue;
            }
        };
        json.push(b'\n');

        match timeout(WRITE_TIMEOUT, writer.write_all(&json)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("Write error: {}", e);
                break;
            }
            Err(_) => {
                warn!("Write timeout, dropping client");
                break;
            }
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Run a bridge call on the blocking pool.
async fn blocking<F>(bridge: &Arc<BiometricsFingerprint>, f: F) -> Response
where
    F: FnOnce(&BiometricsFingerprint) -> ResponseData + Send + 'static,
{
    let bridge = bridge.clone();
    match tokio::task::spawn_blocking(move || f(&bridge)).await {
        Ok(data) => Response::Ok(data),
        Err(e) => {
            error!("Bridge call failed: {}", e);
            Response::error("internal error")
        }
    }
}

async fn process_request(line: &[u8], bridge: &Arc<BiometricsFingerprint>, session: &mut Session) -> ResponseEnvelope {
    let envelope: RequestEnvelope = match serde_json::from_slice(line) {
        Ok(e) => e,
        Err(e) => {
            debug!("Invalid request: {}", e);
            return ResponseEnvelope::new(0, Response::error("Invalid request format"));
        }
    };

    let request_id = envelope.id;
    let request = envelope.request;

    if let Err(e) = request.validate() {
        warn!("Request validation failed: {}", e);
        return ResponseEnvelope::new(request_id, Response::error(e));
    }

    debug!("Processing {} (id={})", request.type_name(), request_id);

    let response = match request {
        Request::Ping => Response::Ok(ResponseData::none()),
        Request::Version => Response::Ok(ResponseData::version(env!("CARGO_PKG_VERSION").to_string())),
        Request::SetNotify => {
            let callback: Arc<dyn ClientCallback> = Arc::new(SocketCallback::new(session.outgoing.clone()));
            session.callback = Some(callback.clone());
            blocking(bridge, move |b| ResponseData::number(b.set_notify(callback))).await
        }
        Request::PreEnroll => blocking(bridge, |b| ResponseData::number(b.pre_enroll())).await,
        Request::Enroll { hat, gid, timeout_sec } => {
            let hat: [u8; AUTH_TOKEN_LEN] = match hat.as_slice().try_into() {
                Ok(h) => h,
                Err(_) => return ResponseEnvelope::new(request_id, Response::error("bad auth token length")),
            };
            blocking(bridge, move |b| ResponseData::status(b.enroll(&hat, gid, timeout_sec))).await
        }
        Request::PostEnroll => blocking(bridge, |b| ResponseData::status(b.post_enroll())).await,
        Request::GetAuthenticatorId => blocking(bridge, |b| ResponseData::number(b.get_authenticator_id())).await,
        Request::Cancel => blocking(bridge, |b| ResponseData::status(b.cancel())).await,
        Request::Enumerate => blocking(bridge, |b| ResponseData::status(b.enumerate())).await,
        Request::Remove { gid, fid } => blocking(bridge, move |b| ResponseData::status(b.remove(gid, fid))).await,
        Request::SetActiveGroup { gid, store_path } => {
            blocking(bridge, move |b| ResponseData::status(b.set_active_group(gid, &store_path))).await
        }
        Request::Authenticate { operation_id, gid } => {
            blocking(bridge, move |b| ResponseData::status(b.authenticate(operation_id, gid))).await
        }
        Request::IsUdfps { sensor_id } => Response::Ok(ResponseData::flag(bridge.is_udfps(sensor_id))),
        Request::OnFingerDown { x, y, minor, major } => {
            bridge.on_finger_down(x, y, minor, major);
            Response::Ok(ResponseData::none())
        }
        Request::OnFingerUp => {
            bridge.on_finger_up();
            Response::Ok(ResponseData::none())
        }
    };

    ResponseEnvelope::new(request_id, response)
}
