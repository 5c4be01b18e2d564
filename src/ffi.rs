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

//! C layout of the legacy fingerprint HAL
//!
//! Mirrors `hardware.h`, `fingerprint.h`, `hw_auth_token.h` and the Xiaomi
//! device extension that turns the first reserved slot into `extCmd`.
//! Nothing in here is safe to touch without the invariants documented on the
//! callers in `hal.rs` and `message.rs`.

use std::os::raw::{c_char, c_int, c_void};

use rp_protocol::AUTH_TOKEN_LEN;

// ============================================================================
// hardware.h
// ============================================================================

#[repr(C)]
pub struct HwModuleMethods {
    pub open: Option<
        unsafe extern "C" fn(module: *const HwModule, id: *const c_char, device: *mut *mut HwDevice) -> c_int,
    >,
}

#[repr(C)]
pub struct HwModule {
    pub tag: u32,
    pub module_api_version: u16,
    pub hal_api_version: u16,
    pub id: *const c_char,
    pub name: *const c_char,
    pub author: *const c_char,
    pub methods: *mut HwModuleMethods,
    pub dso: *mut c_void,
    #[cfg(target_pointer_width = "64")]
    pub reserved: [u64; 32 - 7],
    #[cfg(not(target_pointer_width = "64"))]
    pub reserved: [u32; 32 - 7],
}

#[repr(C)]
pub struct HwDevice {
    pub tag: u32,
    pub version: u32,
    pub module: *mut HwModule,
    #[cfg(target_pointer_width = "64")]
    pub reserved: [u64; 12],
    #[cfg(not(target_pointer_width = "64"))]
    pub reserved: [u32; 12],
    pub close: Option<unsafe extern "C" fn(device: *mut HwDevice) -> c_int>,
}

// ============================================================================
// hw_auth_token.h
// ============================================================================

/// Authentication token exchanged with the driver. `authenticator_type` and
/// `timestamp` are in network byte order.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct HwAuthToken {
    pub version: u8,
    pub challenge: u64,
    pub user_id: u64,
    pub authenticator_id: u64,
    pub authenticator_type: u32,
    pub timestamp: u64,
    pub hmac: [u8; 32],
}

const _: () = assert!(std::mem::size_of::<HwAuthToken>() == AUTH_TOKEN_LEN);

impl HwAuthToken {
    pub fn from_bytes(bytes: &[u8; AUTH_TOKEN_LEN]) -> Self {
        // SAFETY: HwAuthToken is packed plain data of exactly AUTH_TOKEN_LEN bytes,
        // so every bit pattern is valid and no alignment is required.
        unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const HwAuthToken) }
    }

    pub fn to_bytes(&self) -> [u8; AUTH_TOKEN_LEN] {
        // SAFETY: same size, both plain data.
        unsafe { std::mem::transmute_copy(self) }
    }
}

impl std::fmt::Debug for HwAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // copy out of the packed struct before formatting
        let (version, challenge, user_id) = (self.version, self.challenge, self.user_id);
        f.debug_struct("HwAuthToken")
            .field("version", &version)
            .field("challenge", &challenge)
            .field("user_id", &user_id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// fingerprint.h
// ============================================================================

pub const FINGERPRINT_ERROR: c_int = -1;
pub const FINGERPRINT_ACQUIRED: c_int = 1;
pub const FINGERPRINT_TEMPLATE_ENROLLING: c_int = 3;
pub const FINGERPRINT_TEMPLATE_REMOVED: c_int = 4;
pub const FINGERPRINT_AUTHENTICATED: c_int = 5;
pub const FINGERPRINT_TEMPLATE_ENUMERATING: c_int = 6;

pub const FINGERPRINT_ERROR_HW_UNAVAILABLE: i32 = 1;
pub const FINGERPRINT_ERROR_UNABLE_TO_PROCESS: i32 = 2;
pub const FINGERPRINT_ERROR_TIMEOUT: i32 = 3;
pub const FINGERPRINT_ERROR_NO_SPACE: i32 = 4;
pub const FINGERPRINT_ERROR_CANCELED: i32 = 5;
pub const FINGERPRINT_ERROR_UNABLE_TO_REMOVE: i32 = 6;
pub const FINGERPRINT_ERROR_LOCKOUT: i32 = 7;

pub const FINGERPRINT_ACQUIRED_GOOD: i32 = 0;
pub const FINGERPRINT_ACQUIRED_PARTIAL: i32 = 1;
pub const FINGERPRINT_ACQUIRED_INSUFFICIENT: i32 = 2;
pub const FINGERPRINT_ACQUIRED_IMAGER_DIRTY: i32 = 3;
pub const FINGERPRINT_ACQUIRED_TOO_SLOW: i32 = 4;
pub const FINGERPRINT_ACQUIRED_TOO_FAST: i32 = 5;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerId {
    pub gid: u32,
    pub fid: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct FingerprintEnroll {
    pub finger: FingerId,
    pub samples_remaining: u32,
    pub msg: u64,
}

/// Shared layout of `fingerprint_removed_t` and `fingerprint_enumerated_t`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FingerprintIterator {
    pub finger: FingerId,
    pub remaining_templates: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct FingerprintAcquired {
    pub acquired_info: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct FingerprintAuthenticated {
    pub finger: FingerId,
    pub hat: HwAuthToken,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union FingerprintMsgData {
    pub error: c_int,
    pub enroll: FingerprintEnroll,
    pub enumerated: FingerprintIterator,
    pub removed: FingerprintIterator,
    pub acquired: FingerprintAcquired,
    pub authenticated: FingerprintAuthenticated,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct FingerprintMsg {
    pub msg_type: c_int,
    pub data: FingerprintMsgData,
}

pub type FingerprintNotify = Option<unsafe extern "C" fn(msg: *const FingerprintMsg)>;

/// `xiaomi_fingerprint_device_t`: the stock device struct with `extCmd`
/// occupying the first of the four reserved pointers.
#[repr(C)]
pub struct XiaomiFingerprintDevice {
    pub common: HwDevice,
    pub notify: FingerprintNotify,
    pub set_notify:
        Option<unsafe extern "C" fn(dev: *mut XiaomiFingerprintDevice, notify: FingerprintNotify) -> c_int>,
    pub pre_enroll: Option<unsafe extern "C" fn(dev: *mut XiaomiFingerprintDevice) -> u64>,
    pub enroll: Option<
        unsafe extern "C" fn(
            dev: *mut XiaomiFingerprintDevice,
            hat: *const HwAuthToken,
            gid: u32,
            timeout_sec: u32,
        ) -> c_int,
    >,
    pub post_enroll: Option<unsafe extern "C" fn(dev: *mut XiaomiFingerprintDevice) -> c_int>,
    pub get_authenticator_id: Option<unsafe extern "C" fn(dev: *mut XiaomiFingerprintDevice) -> u64>,
    pub cancel: Option<unsafe extern "C" fn(dev: *mut XiaomiFingerprintDevice) -> c_int>,
    pub enumerate: Option<unsafe extern "C" fn(dev: *mut XiaomiFingerprintDevice) -> c_int>,
    pub remove: Option<unsafe extern "C" fn(dev: *mut XiaomiFingerprintDevice, gid: u32, fid: u32) -> c_int>,
    pub set_active_group: Option<
        unsafe extern "C" fn(dev: *mut XiaomiFingerprintDevice, gid: u32, store_path: *const c_char) -> c_int,
    >,
    pub authenticate:
        Option<unsafe extern "C" fn(dev: *mut XiaomiFingerprintDevice, operation_id: u64, gid: u32) -> c_int>,
    pub ext_cmd: Option<unsafe extern "C" fn(dev: *mut XiaomiFingerprintDevice, cmd: c_int, param: c_int) -> c_int>,
    pub reserved: [*mut c_void; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_token_byte_layout() {
        let mut bytes = [0u8; AUTH_TOKEN_LEN];
        bytes[0] = 0;
        bytes[1..9].copy_from_slice(&0x1122_3344_5566_7788u64.to_ne_bytes());
        bytes[AUTH_TOKEN_LEN - 1] = 0xAB;

        let token = HwAuthToken::from_bytes(&bytes);
        let challenge = token.challenge;
        assert_eq!(challenge, 0x1122_3344_5566_7788);
        assert_eq!(token.hmac[31], 0xAB);
        assert_eq!(token.to_bytes(), bytes);
    }

    #[test]
    fn test_device_struct_matches_stock_size() {
        // notify + 10 operations + 4 reserved slots in fingerprint_device_t
        let ptr = std::mem::size_of::<*mut c_void>();
        assert_eq!(
            std::mem::size_of::<XiaomiFingerprintDevice>(),
            std::mem::size_of::<HwDevice>() + 15 * ptr
        );
    }
}
