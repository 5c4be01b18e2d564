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

//! Authentication boost hint
//!
//! After a successful match the bridge asks the power HAL extension for a
//! short `LAUNCH` boost so the unlock animation does not stutter. The
//! connection is made lazily and whether the boost is supported is asked only
//! once:
//!
//! - supported / unsupported answers are cached for the process lifetime
//! - a failed transaction drops the connection so the next attempt reconnects,
//!   and leaves the capability unknown
//!
//! The cache sits behind its own mutex, so overlapping authentication
//! callbacks are serialized.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::constants::boost::{AUTHENTICATED_BOOST, AUTHENTICATED_BOOST_DURATION_MS};

/// Failure talking to the power HAL extension
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PowerHalError {
    /// The transaction itself failed; the service may have died
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
    /// The service answered with an error
    #[error("service error: {0}")]
    Service(String),
}

/// Why no boost was sent
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BoostError {
    #[error("invalid boost request or power HAL extension unavailable")]
    Invalid,
    #[error("power HAL extension not connected")]
    NotConnected,
    #[error("boost not supported")]
    NotSupported,
}

/// The power HAL extension interface
#[cfg_attr(test, mockall::automock)]
pub trait PowerExt: Send + Sync {
    fn is_boost_supported(&self, boost: &str) -> Result<bool, PowerHalError>;
    fn set_boost(&self, boost: &str, duration_ms: i32) -> Result<(), PowerHalError>;
}

/// Service lookup for the power HAL extension
#[cfg_attr(test, mockall::automock)]
pub trait PowerConnector: Send + Sync {
    /// Look up the power service and return its extension, if reachable
    fn connect(&self) -> Option<Arc<dyn PowerExt>>;
}

#[derive(Default)]
struct BoostState {
    supported: bool,
    checked: bool,
    power_ext: Option<Arc<dyn PowerExt>>,
}

/// Sends the post-authentication boost with a memoized capability check
pub struct BoostNotifier {
    connector: Box<dyn PowerConnector>,
    state: Mutex<BoostState>,
}

impl BoostNotifier {
    pub fn new(connector: Box<dyn PowerConnector>) -> Self {
        Self {
            connector,
            state: Mutex::new(BoostState::default()),
        }
    }

    fn connect(&self, state: &mut BoostState) -> Result<Arc<dyn PowerExt>, BoostError> {
        if let Some(ext) = &state.power_ext {
            return Ok(ext.clone());
        }
        match self.connector.connect() {
            Some(ext) => {
                info!("connect power HAL extension successfully");
                state.power_ext = Some(ext.clone());
                Ok(ext)
            }
            None => {
                error!("failed to connect power HAL extension");
                Err(BoostError::Invalid)
            }
        }
    }

    fn check_support(&self, state: &mut BoostState, boost: &str) -> Result<(), BoostError> {
        if boost.is_empty() {
            return Err(BoostError::Invalid);
        }
        let ext = self.connect(state)?;
        match ext.is_boost_supported(boost) {
            Ok(true) => {
                info!("power HAL extension hint is supported: boost={}", boost);
                Ok(())
            }
            Ok(false) => {
                warn!("power HAL extension hint is not supported: boost={}", boost);
                Err(BoostError::NotSupported)
            }
            Err(PowerHalError::TransactionFailed(reason)) => {
                error!("failed to check power HAL extension hint: boost={}", boost);
                error!("binder transaction failed for power HAL extension hint: {}", reason);
                state.power_ext = None;
                Err(BoostError::NotConnected)
            }
            Err(e) => {
                error!("failed to check power HAL extension hint: boost={}: {}", boost, e);
                Err(BoostError::Invalid)
            }
        }
    }

    fn send_boost(&self, state: &mut BoostState, boost: &str, duration_ms: i32) -> Result<(), BoostError> {
        if boost.is_empty() {
            return Err(BoostError::Invalid);
        }
        let ext = self.connect(state)?;
        match ext.set_boost(boost, duration_ms) {
            Ok(()) => Ok(()),
            Err(PowerHalError::TransactionFailed(reason)) => {
                error!(
                    "failed to send power HAL extension hint: boost={}, duration={}",
                    boost, duration_ms
                );
                error!("binder transaction failed for power HAL extension hint: {}", reason);
                state.power_ext = None;
                Err(BoostError::NotConnected)
            }
            Err(e) => {
                error!(
                    "failed to send power HAL extension hint: boost={}, duration={}: {}",
                    boost, duration_ms, e
                );
                Err(BoostError::Invalid)
            }
        }
    }

    fn is_boost_hint_supported(&self, state: &mut BoostState) -> Result<(), BoostError> {
        if state.checked {
            return if state.supported { Ok(()) } else { Err(BoostError::NotSupported) };
        }
        let ret = self.check_support(state, AUTHENTICATED_BOOST);
        match ret {
            Ok(()) => {
                state.supported = true;
                state.checked = true;
                info!("Boost hint is supported");
            }
            Err(BoostError::NotSupported) => {
                state.checked = true;
                info!("Boost hint is unsupported");
            }
            Err(e) => {
                error!("Failed to check the support of boost hint: {}", e);
            }
        }
        ret
    }

    /// Whether the boost is supported, asking the service on first use
    pub fn is_supported(&self) -> Result<(), BoostError> {
        let mut state = self.state.lock();
        self.is_boost_hint_supported(&mut state)
    }

    /// Request the post-authentication boost. Never retries.
    pub fn send_authenticated_boost_hint(&self) -> Result<(), BoostError> {
        let mut state = self.state.lock();
        self.is_boost_hint_supported(&mut state)?;
        self.send_boost(&mut state, AUTHENTICATED_BOOST, AUTHENTICATED_BOOST_DURATION_MS)
    }
}

/// Connector for builds without a power HAL extension
pub struct NoPowerService;

impl PowerConnector for NoPowerService {
    fn connect(&self) -> Option<Arc<dyn PowerExt>> {
        None
    }
}
