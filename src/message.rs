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

use crate::ffi::*;

/// A driver notification decoded out of the C union.
#[derive(Debug, Clone, Copy)]
pub enum DriverMessage {
    Error { code: i32 },
    Acquired { info: i32 },
    Enrolling { finger: FingerId, samples_remaining: u32 },
    Removed { finger: FingerId, remaining_templates: u32 },
    Authenticated { finger: FingerId, token: HwAuthToken },
    Enumerating { finger: FingerId, remaining_templates: u32 },
    /// Type tag this interface version does not define
    Unknown(i32),
}

impl DriverMessage {
    /// Decode a message handed over by the driver.
    ///
    /// # Safety
    /// `msg.data` must hold the union member selected by `msg.msg_type`, as
    /// the driver ABI guarantees for messages passed to the notify callback.
    pub unsafe fn from_raw(msg: &FingerprintMsg) -> Self {
        match msg.msg_type {
            FINGERPRINT_ERROR => DriverMessage::Error { code: msg.data.error },
            FINGERPRINT_ACQUIRED => DriverMessage::Acquired { info: msg.data.acquired.acquired_info },
            FINGERPRINT_TEMPLATE_ENROLLING => DriverMessage::Enrolling {
                finger: msg.data.enroll.finger,
                samples_remaining: msg.data.enroll.samples_remaining,
            },
            FINGERPRINT_TEMPLATE_REMOVED => DriverMessage::Removed {
                finger: msg.data.removed.finger,
                remaining_templates: msg.data.removed.remaining_templates,
            },
            FINGERPRINT_AUTHENTICATED => DriverMessage::Authenticated {
                finger: msg.data.authenticated.finger,
                token: msg.data.authenticated.hat,
            },
            FINGERPRINT_TEMPLATE_ENUMERATING => DriverMessage::Enumerating {
                finger: msg.data.enumerated.finger,
                remaining_templates: msg.data.enumerated.remaining_templates,
            },
            other => DriverMessage::Unknown(other),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            DriverMessage::Error { .. } => "error",
            DriverMessage::Acquired { .. } => "acquired",
            DriverMessage::Enrolling { .. } => "enrolling",
            DriverMessage::Removed { .. } => "removed",
            DriverMessage::Authenticated { .. } => "authenticated",
            DriverMessage::Enumerating { .. } => "enumerating",
            DriverMessage::Unknown(_) => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_protocol::AUTH_TOKEN_LEN;

    #[test]
    fn test_decode_removed() {
        let msg = FingerprintMsg {
            msg_type: FINGERPRINT_TEMPLATE_REMOVED,
            data: FingerprintMsgData {
                removed: FingerprintIterator { finger: FingerId { gid: 0, fid: 42 }, remaining_templates: 2 },
            },
        };
        match unsafe { DriverMessage::from_raw(&msg) } {
            DriverMessage::Removed { finger, remaining_templates } => {
                assert_eq!(finger, FingerId { gid: 0, fid: 42 });
                assert_eq!(remaining_templates, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_authenticated_keeps_token() {
        let mut bytes = [0u8; AUTH_TOKEN_LEN];
        bytes[0] = 1;
        let msg = FingerprintMsg {
            msg_type: FINGERPRINT_AUTHENTICATED,
            data: FingerprintMsgData {
                authenticated: FingerprintAuthenticated {
                    finger: FingerId { gid: 0, fid: 7 },
                    hat: HwAuthToken::from_bytes(&bytes),
                },
            },
        };
        match unsafe { DriverMessage::from_raw(&msg) } {
            DriverMessage::Authenticated { finger, token } => {
                assert_eq!(finger.fid, 7);
                assert_eq!(token.to_bytes(), bytes);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_tag() {
        let msg = FingerprintMsg { msg_type: 2, data: FingerprintMsgData { error: 0 } };
        assert!(matches!(unsafe { DriverMessage::from_raw(&msg) }, DriverMessage::Unknown(2)));
    }
}
