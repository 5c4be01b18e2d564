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

use std::path::Path;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter for `fingerprintd`
pub const LOG_ENV: &str = "RAPHAEL_FP_LOG";

const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";

/// Where log output ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink {
    Journald,
    Stderr,
}

impl LogSink {
    pub fn describe(self) -> &'static str {
        match self {
            LogSink::Journald => "systemd journal",
            LogSink::Stderr => "stderr",
        }
    }
}

/// Filter from `LOG_ENV`, `info` when unset.
pub fn log_level() -> String {
    std::env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string())
}

/// Install the global subscriber: journald when its socket exists, stderr otherwise.
pub fn init_logging(log_level: &str) -> LogSink {
    if Path::new(JOURNALD_SOCKET).exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(EnvFilter::new(log_level))
                    .init();
                return LogSink::Journald;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stderr", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_env_filter(log_level)
        .init();
    LogSink::Stderr
}
