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

use rp_protocol::{FingerprintAcquiredInfo, FingerprintError};
use thiserror::Error;

/// Delivery of a callback to the client failed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("client is gone")]
    Disconnected,
    #[error("client event queue is full")]
    QueueFull,
    #[error("callback transport error: {0}")]
    Transport(String),
}

/// Client side of the fingerprint interface, invoked from the driver thread
#[cfg_attr(test, mockall::automock)]
pub trait ClientCallback: Send + Sync {
    fn on_error(&self, device_id: u64, error: FingerprintError, vendor_code: i32) -> Result<(), CallbackError>;

    fn on_acquired(
        &self,
        device_id: u64,
        acquired_info: FingerprintAcquiredInfo,
        vendor_code: i32,
    ) -> Result<(), CallbackError>;

    fn on_enroll_result(&self, device_id: u64, finger_id: u32, group_id: u32, remaining: u32)
        -> Result<(), CallbackError>;

    fn on_removed(&self, device_id: u64, finger_id: u32, group_id: u32, remaining: u32) -> Result<(), CallbackError>;

    /// `token` is empty when no enrolled finger matched
    fn on_authenticated(&self, device_id: u64, finger_id: u32, group_id: u32, token: &[u8])
        -> Result<(), CallbackError>;

    fn on_enumerate(&self, device_id: u64, finger_id: u32, group_id: u32, remaining: u32)
        -> Result<(), CallbackError>;
}
