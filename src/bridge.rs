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

//! Fingerprint HAL bridge
//!
//! [`BiometricsFingerprint`] owns the opened vendor device, forwards client
//! requests to it and turns driver notifications into [`ClientCallback`]
//! calls. A bridge without a device stays usable: every request reports
//! `SysUnknown` (or 0 for id requests) instead of failing hard.

use std::ffi::CString;
use std::path::Path;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rp_props::PropertyStore;
use rp_protocol::{RequestStatus, AUTH_TOKEN_LEN};
use tracing::{debug, error, info, warn};

use crate::boost::BoostNotifier;
use crate::callback::ClientCallback;
use crate::constants::{hal::COMMAND_NIT, paths::PATH_MAX, props};
use crate::ffi::HwAuthToken;
use crate::fod::FodWatcher;
use crate::hal::{self, ModuleDescriptor, ModuleOpener, VendorDevice};
use crate::message::DriverMessage;
use crate::status::{error_filter, vendor_acquired_filter, vendor_error_filter};

pub struct BiometricsFingerprint {
    device: Option<Box<dyn VendorDevice>>,
    module: Option<ModuleDescriptor>,
    client_callback: Mutex<Option<Arc<dyn ClientCallback>>>,
    boost: BoostNotifier,
    props: Arc<dyn PropertyStore>,
}

impl BiometricsFingerprint {
    /// Open the first vendor module that works and record which one it was.
    pub fn open(opener: &dyn ModuleOpener, props: Arc<dyn PropertyStore>, boost: BoostNotifier) -> Self {
        let (device, module) = match hal::open_first(opener) {
            Some((device, module)) => {
                if let Err(e) = props.set(props::FP_VENDOR, module.class_name) {
                    warn!("Failed to record fingerprint vendor: {}", e);
                }
                (Some(device), Some(module))
            }
            None => (None, None),
        };

        Self {
            device,
            module,
            client_callback: Mutex::new(None),
            boost,
            props,
        }
    }

    pub fn is_opened(&self) -> bool {
        self.device.is_some()
    }

    /// Whether a client is currently subscribed to driver callbacks
    pub fn has_client_callback(&self) -> bool {
        self.client_callback.lock().is_some()
    }

    pub fn class_name(&self) -> Option<&'static str> {
        self.module.map(|m| m.class_name)
    }

    fn is_fod(&self) -> bool {
        self.module.map(|m| m.fod).unwrap_or(false)
    }

    fn device_id(&self) -> u64 {
        self.device.as_ref().map(|d| d.device_id()).unwrap_or(0)
    }

    fn status_call(&self, op: &str, f: impl FnOnce(&dyn VendorDevice) -> i32) -> RequestStatus {
        match &self.device {
            Some(device) => error_filter(f(device.as_ref())),
            None => {
                warn!("{} requested but no fingerprint module is open", op);
                RequestStatus::SysUnknown
            }
        }
    }

    fn id_call(&self, f: impl FnOnce(&dyn VendorDevice) -> u64) -> u64 {
        self.device.as_ref().map(|d| f(d.as_ref())).unwrap_or(0)
    }

    /// Start watching the FOD overlay if the open module is under-display.
    ///
    /// Every reading becomes an extended NIT command on the driver. Returns
    /// `None` for modules without FOD support.
    pub fn start_fod_watcher(self: &Arc<Self>, fod_ui_path: &Path) -> Option<FodWatcher> {
        if !self.is_fod() {
            return None;
        }

        let bridge: Weak<Self> = Arc::downgrade(self);
        let watcher = FodWatcher::spawn(fod_ui_path, move |state| {
            let Some(bridge) = bridge.upgrade() else {
                return;
            };
            let rc = bridge.ext_cmd(COMMAND_NIT, state.param());
            if rc != 0 {
                warn!("NIT command {:?} failed: {}", state, rc);
            }
        });

        if let Err(e) = self.props.set(props::FP_FOD, "true") {
            warn!("Failed to set {}: {}", props::FP_FOD, e);
        }

        match watcher {
            Ok(w) => Some(w),
            Err(e) => {
                error!("Failed to start FOD watcher: {}", e);
                None
            }
        }
    }

    // ========================================================================
    // Client requests
    // ========================================================================

    /// Register the client callback. Returns the device id, 0 without a device.
    pub fn set_notify(&self, callback: Arc<dyn ClientCallback>) -> u64 {
        *self.client_callback.lock() = Some(callback);
        self.device_id()
    }

    /// Drop the client callback if it is still `callback`.
    pub fn clear_notify(&self, callback: &Arc<dyn ClientCallback>) {
        let mut guard = self.client_callback.lock();
        if guard.as_ref().is_some_and(|current| Arc::ptr_eq(current, callback)) {
            *guard = None;
        }
    }

    pub fn pre_enroll(&self) -> u64 {
        self.id_call(|d| d.pre_enroll())
    }

    pub fn enroll(&self, hat: &[u8; AUTH_TOKEN_LEN], gid: u32, timeout_sec: u32) -> RequestStatus {
        let token = HwAuthToken::from_bytes(hat);
        self.status_call("enroll", |d| d.enroll(&token, gid, timeout_sec))
    }

    pub fn post_enroll(&self) -> RequestStatus {
        self.status_call("postEnroll", |d| d.post_enroll())
    }

    pub fn get_authenticator_id(&self) -> u64 {
        self.id_call(|d| d.get_authenticator_id())
    }

    pub fn cancel(&self) -> RequestStatus {
        self.status_call("cancel", |d| d.cancel())
    }

    pub fn enumerate(&self) -> RequestStatus {
        self.status_call("enumerate", |d| d.enumerate())
    }

    pub fn remove(&self, gid: u32, fid: u32) -> RequestStatus {
        self.status_call("remove", |d| d.remove(gid, fid))
    }

    /// Point the driver at the template directory for `gid`.
    ///
    /// The path must be non-empty, shorter than `PATH_MAX`, free of NUL bytes
    /// and writable; otherwise `SysEinval` is returned without touching the
    /// driver.
    pub fn set_active_group(&self, gid: u32, store_path: &str) -> RequestStatus {
        if store_path.is_empty() || store_path.len() >= PATH_MAX {
            error!("Bad path length: {}", store_path.len());
            return RequestStatus::SysEinval;
        }
        let c_path = match CString::new(store_path) {
            Ok(p) => p,
            Err(_) => {
                error!("Store path contains a NUL byte");
                return RequestStatus::SysEinval;
            }
        };
        // SAFETY: c_path is a valid NUL terminated string.
        if unsafe { libc::access(c_path.as_ptr(), libc::W_OK) } != 0 {
            error!("Store path {} is not writable", store_path);
            return RequestStatus::SysEinval;
        }

        self.status_call("setActiveGroup", |d| d.set_active_group(gid, &c_path))
    }

    pub fn authenticate(&self, operation_id: u64, gid: u32) -> RequestStatus {
        self.status_call("authenticate", |d| d.authenticate(operation_id, gid))
    }

    pub fn is_udfps(&self, _sensor_id: u32) -> bool {
        self.is_fod()
    }

    pub fn on_finger_down(&self, x: u32, y: u32, minor: f32, major: f32) {
        debug!("onFingerDown x={} y={} minor={} major={}", x, y, minor, major);
    }

    pub fn on_finger_up(&self) {
        debug!("onFingerUp");
    }

    /// Raw extended command; returns the driver's result.
    pub fn ext_cmd(&self, cmd: i32, param: i32) -> i32 {
        match &self.device {
            Some(device) => device.ext_cmd(cmd, param),
            None => -libc::ENODEV,
        }
    }

    // ========================================================================
    // Driver notifications
    // ========================================================================

    /// Forward a driver notification to the registered client.
    pub fn notify(&self, msg: DriverMessage) {
        let dev_id = self.device_id();
        let guard = self.client_callback.lock();
        let Some(callback) = guard.as_ref() else {
            error!("Receiving callbacks before the client callback is registered.");
            return;
        };

        let mut boost = false;
        let result = match msg {
            DriverMessage::Error { code } => {
                let (error, vendor_code) = vendor_error_filter(code);
                debug!("onError({:?}, {})", error, vendor_code);
                callback.on_error(dev_id, error, vendor_code)
            }
            DriverMessage::Acquired { info } => {
                let (acquired_info, vendor_code) = vendor_acquired_filter(info);
                debug!("onAcquired({:?}, {})", acquired_info, vendor_code);
                callback.on_acquired(dev_id, acquired_info, vendor_code)
            }
            DriverMessage::Enrolling { finger, samples_remaining } => {
                debug!("onEnrollResult(fid={}, gid={}, rem={})", finger.fid, finger.gid, samples_remaining);
                callback.on_enroll_result(dev_id, finger.fid, finger.gid, samples_remaining)
            }
            DriverMessage::Removed { finger, remaining_templates } => {
                debug!("onRemove(fid={}, gid={}, rem={})", finger.fid, finger.gid, remaining_templates);
                callback.on_removed(dev_id, finger.fid, finger.gid, remaining_templates)
            }
            DriverMessage::Authenticated { finger, token } => {
                debug!("onAuthenticated(fid={}, gid={})", finger.fid, finger.gid);
                if finger.fid != 0 {
                    let bytes = token.to_bytes();
                    let delivered = callback.on_authenticated(dev_id, finger.fid, finger.gid, &bytes);
                    boost = delivered.is_ok();
                    delivered
                } else {
                    // Not a recognized fingerprint
                    callback.on_authenticated(dev_id, finger.fid, finger.gid, &[])
                }
            }
            DriverMessage::Enumerating { finger, remaining_templates } => {
                debug!("onEnumerate(fid={}, gid={}, rem={})", finger.fid, finger.gid, remaining_templates);
                callback.on_enumerate(dev_id, finger.fid, finger.gid, remaining_templates)
            }
            DriverMessage::Unknown(tag) => {
                error!("Unknown fingerprint message type {}, dropped", tag);
                return;
            }
        };
        drop(guard);

        if let Err(e) = result {
            error!("failed to invoke fingerprint {} callback: {}", msg.type_name(), e);
        }
        if boost {
            match self.boost.send_authenticated_boost_hint() {
                Ok(()) => debug!("Sent authenticated boost hint"),
                Err(e) => info!("Authenticated boost hint not sent: {}", e),
            }
        }
    }
}
