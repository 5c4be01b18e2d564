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

//! Power HAL extension client
//!
//! Talks to the power extension service over a Unix socket, one JSON line per
//! request and per reply. Socket failures are reported as failed
//! transactions so the boost notifier reconnects on the next attempt.

use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rp_protocol::{PowerRequest, PowerResponse, MAX_MESSAGE_SIZE};
use tracing::{debug, warn};

use crate::boost::{PowerConnector, PowerExt, PowerHalError};
use crate::constants::boost::POWER_INSTANCE;

const TIMEOUT_MS: u64 = 1000;

struct Connection {
    writer: UnixStream,
    reader: BufReader<UnixStream>,
}

/// A connected power HAL extension
pub struct SocketPowerExt {
    conn: Mutex<Connection>,
}

impl SocketPowerExt {
    pub fn connect(path: &std::path::Path) -> std::io::Result<Self> {
        let stream = UnixStream::connect(path)?;
        stream.set_read_timeout(Some(Duration::from_millis(TIMEOUT_MS)))?;
        stream.set_write_timeout(Some(Duration::from_millis(TIMEOUT_MS)))?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            conn: Mutex::new(Connection { writer: stream, reader }),
        })
    }

    fn request(&self, req: &PowerRequest) -> Result<Option<bool>, PowerHalError> {
        let mut json = serde_json::to_vec(req).map_err(|e| PowerHalError::Service(e.to_string()))?;
        json.push(b'\n');

        let mut conn = self.conn.lock();
        conn.writer
            .write_all(&json)
            .map_err(|e| PowerHalError::TransactionFailed(format!("send: {}", e)))?;

        let mut buf = Vec::with_capacity(256);
        (&mut conn.reader)
            .take(MAX_MESSAGE_SIZE as u64 + 1)
            .read_until(b'\n', &mut buf)
            .map_err(|e| PowerHalError::TransactionFailed(format!("receive: {}", e)))?;
        if buf.is_empty() {
            return Err(PowerHalError::TransactionFailed("power service closed the connection".into()));
        }
        if buf.len() > MAX_MESSAGE_SIZE {
            return Err(PowerHalError::TransactionFailed(format!(
                "reply of {} bytes exceeds {}",
                buf.len(),
                MAX_MESSAGE_SIZE
            )));
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }

        let response: PowerResponse =
            serde_json::from_slice(&buf).map_err(|e| PowerHalError::TransactionFailed(format!("bad reply: {}", e)))?;
        match response {
            PowerResponse::Ok { supported } => Ok(supported),
            PowerResponse::Error { message } => Err(PowerHalError::Service(message)),
        }
    }
}

impl PowerExt for SocketPowerExt {
    fn is_boost_supported(&self, boost: &str) -> Result<bool, PowerHalError> {
        let supported = self.request(&PowerRequest::IsBoostSupported { boost: boost.to_string() })?;
        supported.ok_or_else(|| PowerHalError::Service("reply is missing the supported flag".into()))
    }

    fn set_boost(&self, boost: &str, duration_ms: i32) -> Result<(), PowerHalError> {
        self.request(&PowerRequest::SetBoost { boost: boost.to_string(), duration_ms })
            .map(|_| ())
    }
}

/// Looks the power extension up at a socket path
pub struct SocketPowerConnector {
    path: PathBuf,
}

impl SocketPowerConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PowerConnector for SocketPowerConnector {
    fn connect(&self) -> Option<Arc<dyn PowerExt>> {
        match SocketPowerExt::connect(&self.path) {
            Ok(ext) => {
                debug!("Connected to {} extension at {}", POWER_INSTANCE, self.path.display());
                Some(Arc::new(ext))
            }
            Err(e) => {
                warn!("Cannot reach {} extension at {}: {}", POWER_INSTANCE, self.path.display(), e);
                None
            }
        }
    }
}
