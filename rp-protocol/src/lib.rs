//! Wire types shared by `fingerprintd`, its clients and the power hint transport.
//!
//! Messages are newline-delimited JSON. Requests travel in a [`RequestEnvelope`],
//! and the server answers with [`ServerMessage`] lines that carry either the
//! response to a request or an asynchronous [`ClientEvent`] produced by the
//! fingerprint driver.

use serde::{Deserialize, Serialize};

/// Maximum message size for IPC (8KB)
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024;

/// Size of the packed `hw_auth_token_t` the driver consumes and produces
pub const AUTH_TOKEN_LEN: usize = 69;

// ============================================================================
// Status enumerations
// ============================================================================

/// Result of a bridge request. Discriminants follow the errno convention of
/// the fingerprint HAL (`SYS_OK = 0`, `SYS_UNKNOWN = 1`, negative errno
/// otherwise) and travel on the wire as that integer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(into = "i32", try_from = "i32")]
#[repr(i32)]
pub enum RequestStatus {
    SysUnknown = 1,
    SysOk = 0,
    SysEnoent = -2,
    SysEintr = -4,
    SysEio = -5,
    SysEagain = -11,
    SysEnomem = -12,
    SysEacces = -13,
    SysEfault = -14,
    SysEbusy = -16,
    SysEinval = -22,
    SysEnospc = -28,
    SysEtimedout = -110,
}

impl RequestStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == RequestStatus::SysOk
    }
}

impl From<RequestStatus> for i32 {
    fn from(status: RequestStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i32> for RequestStatus {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        let status = match code {
            1 => RequestStatus::SysUnknown,
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
            other => return Err(format!("unknown request status {}", other)),
        };
        Ok(status)
    }
}

/// Error reported to the client through `on_error`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum FingerprintError {
    HwUnavailable = 1,
    UnableToProcess = 2,
    Timeout = 3,
    NoSpace = 4,
    Canceled = 5,
    UnableToRemove = 6,
    Lockout = 7,
    /// Vendor specific; the detail travels in the accompanying vendor code
    Vendor = 8,
}

/// Acquisition quality reported to the client through `on_acquired`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum FingerprintAcquiredInfo {
    Good = 0,
    Partial = 1,
    Insufficient = 2,
    ImagerDirty = 3,
    TooSlow = 4,
    TooFast = 5,
    /// Vendor specific; the detail travels in the accompanying vendor code
    Vendor = 6,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation and debugging
    pub id: u64,
    /// The actual request
    #[serde(flatten)]
    pub request: Request,
}

impl RequestEnvelope {
    pub fn with_id(request: Request, id: u64) -> Self {
        Self { id, request }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "data")]
pub enum Request {
    Ping,
    Version,
    /// Subscribe this connection to driver callbacks
    SetNotify,
    PreEnroll,
    Enroll { hat: Vec<u8>, gid: u32, timeout_sec: u32 },
    PostEnroll,
    GetAuthenticatorId,
    Cancel,
    Enumerate,
    Remove { gid: u32, fid: u32 },
    SetActiveGroup { gid: u32, store_path: String },
    Authenticate { operation_id: u64, gid: u32 },
    IsUdfps { sensor_id: u32 },
    OnFingerDown { x: u32, y: u32, minor: f32, major: f32 },
    OnFingerUp,
}

impl Request {
    /// Structural validation done before a request reaches the bridge.
    ///
    /// Store path checks are left to the bridge, which reports them as
    /// `SysEinval` like the native interface does.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Request::Enroll { hat, .. } => {
                if hat.len() != AUTH_TOKEN_LEN {
                    return Err(format!(
                        "auth token must be {} bytes, got {}",
                        AUTH_TOKEN_LEN,
                        hat.len()
                    ));
                }
                Ok(())
            }
            Request::OnFingerDown { minor, major, .. } => {
                if !minor.is_finite() || !major.is_finite() {
                    return Err("touch axes must be finite".into());
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Request::Ping => "Ping",
            Request::Version => "Version",
            Request::SetNotify => "SetNotify",
            Request::PreEnroll => "PreEnroll",
            Request::Enroll { .. } => "Enroll",
            Request::PostEnroll => "PostEnroll",
            Request::GetAuthenticatorId => "GetAuthenticatorId",
            Request::Cancel => "Cancel",
            Request::Enumerate => "Enumerate",
            Request::Remove { .. } => "Remove",
            Request::SetActiveGroup { .. } => "SetActiveGroup",
            Request::Authenticate { .. } => "Authenticate",
            Request::IsUdfps { .. } => "IsUdfps",
            Request::OnFingerDown { .. } => "OnFingerDown",
            Request::OnFingerUp => "OnFingerUp",
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to
    pub id: u64,
    /// The actual response
    #[serde(flatten)]
    pub response: Response,
}

impl ResponseEnvelope {
    pub fn new(id: u64, response: Response) -> Self {
        Self { id, response }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Response {
    #[serde(rename = "ok")]
    Ok(ResponseData),
    #[serde(rename = "error")]
    Error { message: String },
}

impl Response {
    pub fn error(msg: impl Into<String>) -> Self {
        Response::Error { message: msg.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_status: Option<RequestStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udfps: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ResponseData {
    pub fn none() -> Self { Self::default() }
    pub fn status(s: RequestStatus) -> Self { Self { request_status: Some(s), ..Self::default() } }
    pub fn number(v: u64) -> Self { Self { value: Some(v), ..Self::default() } }
    pub fn flag(b: bool) -> Self { Self { udfps: Some(b), ..Self::default() } }
    pub fn version(v: String) -> Self { Self { version: Some(v), ..Self::default() } }
}

// ============================================================================
// Driver callbacks
// ============================================================================

/// Asynchronous driver result forwarded to the subscribed client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    Error {
        device_id: u64,
        error: FingerprintError,
        vendor_code: i32,
    },
    Acquired {
        device_id: u64,
        acquired_info: FingerprintAcquiredInfo,
        vendor_code: i32,
    },
    EnrollResult {
        device_id: u64,
        finger_id: u32,
        group_id: u32,
        remaining: u32,
    },
    Removed {
        device_id: u64,
        finger_id: u32,
        group_id: u32,
        remaining: u32,
    },
    /// `token` is empty when the finger was not recognized
    Authenticated {
        device_id: u64,
        finger_id: u32,
        group_id: u32,
        token: Vec<u8>,
    },
    Enumerate {
        device_id: u64,
        finger_id: u32,
        group_id: u32,
        remaining: u32,
    },
}

/// One line written by the server: a response or a pushed event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum ServerMessage {
    Response(ResponseEnvelope),
    Event(ClientEvent),
}

// ============================================================================
// Power hint transport
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", content = "data")]
pub enum PowerRequest {
    IsBoostSupported { boost: String },
    SetBoost { boost: String, duration_ms: i32 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PowerResponse {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        supported: Option<bool>,
    },
    Error { message: String },
}
