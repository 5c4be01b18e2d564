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

//! Process-wide bridge instance for the driver's notify callback
//!
//! The vendor library calls back through a plain C function pointer with no
//! user data, so the trampoline looks the bridge up here.

use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bridge::BiometricsFingerprint;
use crate::ffi::FingerprintMsg;
use crate::message::DriverMessage;

lazy_static! {
    static ref INSTANCE: Mutex<Option<Arc<BiometricsFingerprint>>> = Mutex::new(None);
}

/// Make `bridge` the target of driver notifications, replacing any previous one.
pub fn register(bridge: Arc<BiometricsFingerprint>) {
    let mut instance = INSTANCE.lock();
    if instance.is_some() {
        warn!("Replacing registered fingerprint bridge");
    }
    *instance = Some(bridge);
}

pub fn unregister() -> Option<Arc<BiometricsFingerprint>> {
    INSTANCE.lock().take()
}

pub fn instance() -> Option<Arc<BiometricsFingerprint>> {
    INSTANCE.lock().clone()
}

/// Notify callback handed to the vendor driver.
///
/// # Safety
/// `msg` must be null or point at a message that is valid for the duration
/// of the call, as the driver guarantees.
pub unsafe extern "C" fn notify_trampoline(msg: *const FingerprintMsg) {
    if msg.is_null() {
        warn!("Driver sent a null message");
        return;
    }
    let message = DriverMessage::from_raw(&*msg);

    // Release the registry lock before dispatching
    let bridge = instance();
    match bridge {
        Some(bridge) => bridge.notify(message),
        None => debug!("Dropping {} message, no bridge registered", message.type_name()),
    }
}
