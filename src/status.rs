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

//! Translation of raw driver codes into the client-visible enumerations.

use rp_protocol::{FingerprintAcquiredInfo, FingerprintError, RequestStatus};
use tracing::error;

use crate::constants::hal::{ACQUIRED_VENDOR_BASE, ERROR_VENDOR_BASE};
use crate::ffi::*;

/// Map a driver return code (0 or negative errno) to a request status.
pub fn error_filter(code: i32) -> RequestStatus {
    match code {
        0 => RequestStatus::SysOk,
        -2 => RequestStatus::SysEnoent,
        -4 => RequestStatus::SysEintr,
        -5 => RequestStatus::SysEio,
        -11 => RequestStatus::SysEagain,
        -12 => RequestStatus::SysEnomem,
        -13 => RequestStatus::SysEacces,
        -14 => RequestStatus::SysEfault,
        -16 => RequestStatus::SysEbusy,
        -22 => RequestStatus::SysEinval,
        -28 => RequestStatus::SysEnospc,
        -110 => RequestStatus::SysEtimedout,
        other => {
            error!("An unknown error returned from fingerprint vendor library: {}", other);
            RequestStatus::SysUnknown
        }
    }
}

/// Map a driver error message to the client error and its vendor code.
///
/// Codes at or above the vendor base come back as `Vendor` with the offset
/// from the base; unlisted codes below it become `UnableToProcess`.
pub fn vendor_error_filter(code: i32) -> (FingerprintError, i32) {
    match code {
        FINGERPRINT_ERROR_HW_UNAVAILABLE => (FingerprintError::HwUnavailable, 0),
        FINGERPRINT_ERROR_UNABLE_TO_PROCESS => (FingerprintError::UnableToProcess, 0),
        FINGERPRINT_ERROR_TIMEOUT => (FingerprintError::Timeout, 0),
        FINGERPRINT_ERROR_NO_SPACE => (FingerprintError::NoSpace, 0),
        FINGERPRINT_ERROR_CANCELED => (FingerprintError::Canceled, 0),
        FINGERPRINT_ERROR_UNABLE_TO_REMOVE => (FingerprintError::UnableToRemove, 0),
        FINGERPRINT_ERROR_LOCKOUT => (FingerprintError::Lockout, 0),
        c if c >= ERROR_VENDOR_BASE => (FingerprintError::Vendor, c - ERROR_VENDOR_BASE),
        other => {
            error!("Unknown error from fingerprint vendor library: {}", other);
            (FingerprintError::UnableToProcess, 0)
        }
    }
}

/// Map a driver acquisition message to the client info and its vendor code.
pub fn vendor_acquired_filter(info: i32) -> (FingerprintAcquiredInfo, i32) {
    match info {
        FINGERPRINT_ACQUIRED_GOOD => (FingerprintAcquiredInfo::Good, 0),
        FINGERPRINT_ACQUIRED_PARTIAL => (FingerprintAcquiredInfo::Partial, 0),
        FINGERPRINT_ACQUIRED_INSUFFICIENT => (FingerprintAcquiredInfo::Insufficient, 0),
        FINGERPRINT_ACQUIRED_IMAGER_DIRTY => (FingerprintAcquiredInfo::ImagerDirty, 0),
        FINGERPRINT_ACQUIRED_TOO_SLOW => (FingerprintAcquiredInfo::TooSlow, 0),
        FINGERPRINT_ACQUIRED_TOO_FAST => (FingerprintAcquiredInfo::TooFast, 0),
        i if i >= ACQUIRED_VENDOR_BASE => (FingerprintAcquiredInfo::Vendor, i - ACQUIRED_VENDOR_BASE),
        other => {
            error!("Unknown acquiredmsg from fingerprint vendor library: {}", other);
            (FingerprintAcquiredInfo::Insufficient, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_filter_table() {
        let table = [
            (0, RequestStatus::SysOk),
            (-2, RequestStatus::SysEnoent),
            (-4, RequestStatus::SysEintr),
            (-5, RequestStatus::SysEio),
            (-11, RequestStatus::SysEagain),
            (-12, RequestStatus::SysEnomem),
            (-13, RequestStatus::SysEacces),
            (-14, RequestStatus::SysEfault),
            (-16, RequestStatus::SysEbusy),
            (-22, RequestStatus::SysEinval),
            (-28, RequestStatus::SysEnospc),
            (-110, RequestStatus::SysEtimedout),
        ];
        for (code, expected) in table {
            assert_eq!(error_filter(code), expected, "code {}", code);
        }
    }

    #[test]
    fn test_error_filter_unknown_codes() {
        for code in [1, -1, -3, -38, -111, i32::MIN, i32::MAX] {
            assert_eq!(error_filter(code), RequestStatus::SysUnknown, "code {}", code);
        }
    }

    #[test]
    fn test_vendor_error_filter_known() {
        assert_eq!(vendor_error_filter(1), (FingerprintError::HwUnavailable, 0));
        assert_eq!(vendor_error_filter(2), (FingerprintError::UnableToProcess, 0));
        assert_eq!(vendor_error_filter(3), (FingerprintError::Timeout, 0));
        assert_eq!(vendor_error_filter(4), (FingerprintError::NoSpace, 0));
        assert_eq!(vendor_error_filter(5), (FingerprintError::Canceled, 0));
        assert_eq!(vendor_error_filter(6), (FingerprintError::UnableToRemove, 0));
        assert_eq!(vendor_error_filter(7), (FingerprintError::Lockout, 0));
    }

    #[test]
    fn test_vendor_error_filter_vendor_band() {
        assert_eq!(vendor_error_filter(1000), (FingerprintError::Vendor, 0));
        assert_eq!(vendor_error_filter(1006), (FingerprintError::Vendor, 6));
        assert_eq!(vendor_error_filter(i32::MAX), (FingerprintError::Vendor, i32::MAX - 1000));
    }

    #[test]
    fn test_vendor_error_filter_unlisted_below_base() {
        for code in [0, 8, 999, -1] {
            assert_eq!(vendor_error_filter(code), (FingerprintError::UnableToProcess, 0), "code {}", code);
        }
    }

    #[test]
    fn test_vendor_acquired_filter() {
        assert_eq!(vendor_acquired_filter(0), (FingerprintAcquiredInfo::Good, 0));
        assert_eq!(vendor_acquired_filter(1), (FingerprintAcquiredInfo::Partial, 0));
        assert_eq!(vendor_acquired_filter(2), (FingerprintAcquiredInfo::Insufficient, 0));
        assert_eq!(vendor_acquired_filter(3), (FingerprintAcquiredInfo::ImagerDirty, 0));
        assert_eq!(vendor_acquired_filter(4), (FingerprintAcquiredInfo::TooSlow, 0));
        assert_eq!(vendor_acquired_filter(5), (FingerprintAcquiredInfo::TooFast, 0));
        assert_eq!(vendor_acquired_filter(1022), (FingerprintAcquiredInfo::Vendor, 22));
        // FINGERPRINT_ACQUIRED_DETECTED has no client counterpart in this interface version
        assert_eq!(vendor_acquired_filter(6), (FingerprintAcquiredInfo::Insufficient, 0));
    }
}
