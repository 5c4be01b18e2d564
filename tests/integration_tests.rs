/*
 * Integration tests for raphael-biometrics
 *
 * These drive the bridge the way fingerprintd does: a vendor device opened
 * through the module table, the socket front end, and driver notifications
 * arriving through the C trampoline.
 */

use std::ffi::CStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use raphael_biometrics::boost::{BoostNotifier, NoPowerService};
use raphael_biometrics::ffi::*;
use raphael_biometrics::hal::{ModuleOpener, VendorDevice};
use raphael_biometrics::{registry, server, BiometricsFingerprint};
use rp_error::{RaphaelError, Result};
use rp_props::{MemoryProperties, PropertyStore};
use rp_protocol::{
    ClientEvent, Request, RequestEnvelope, RequestStatus, Response, ServerMessage, AUTH_TOKEN_LEN,
};
use serial_test::serial;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

const DEVICE_ID: u64 = 0x7f00_1000;

// ============================================================================
// Test doubles
// ============================================================================

/// Vendor device that records the calls it receives
#[derive(Clone, Default)]
struct FakeDevice {
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeDevice {
    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

impl VendorDevice for FakeDevice {
    fn device_id(&self) -> u64 {
        DEVICE_ID
    }
    fn pre_enroll(&self) -> u64 {
        self.record("pre_enroll".into());
        0xc0ffee
    }
    fn enroll(&self, hat: &HwAuthToken, gid: u32, timeout_sec: u32) -> i32 {
        let version = hat.version;
        self.record(format!("enroll v{} gid={} timeout={}", version, gid, timeout_sec));
        0
    }
    fn post_enroll(&self) -> i32 {
        self.record("post_enroll".into());
        0
    }
    fn get_authenticator_id(&self) -> u64 {
        42
    }
    fn cancel(&self) -> i32 {
        self.record("cancel".into());
        -libc::EBUSY
    }
    fn enumerate(&self) -> i32 {
        0
    }
    fn remove(&self, gid: u32, fid: u32) -> i32 {
        self.record(format!("remove gid={} fid={}", gid, fid));
        0
    }
    fn set_active_group(&self, gid: u32, store_path: &CStr) -> i32 {
        self.record(format!("set_active_group gid={} path={}", gid, store_path.to_string_lossy()));
        0
    }
    fn authenticate(&self, operation_id: u64, gid: u32) -> i32 {
        self.record(format!("authenticate op={} gid={}", operation_id, gid));
        0
    }
    fn ext_cmd(&self, cmd: i32, param: i32) -> i32 {
        self.record(format!("ext_cmd {} {}", cmd, param));
        0
    }
}

/// Opens `device` under one class name and fails every other
struct FakeOpener {
    class_name: &'static str,
    device: Mutex<Option<FakeDevice>>,
}

impl ModuleOpener for FakeOpener {
    fn open(&self, class_name: &str) -> Result<Box<dyn VendorDevice>> {
        if class_name != self.class_name {
            return Err(RaphaelError::ModuleNotFound(class_name.to_string()));
        }
        self.device
            .lock()
            .take()
            .map(|d| Box::new(d) as Box<dyn VendorDevice>)
            .ok_or_else(|| RaphaelError::ModuleNotFound(class_name.to_string()))
    }
}

fn open_bridge(class_name: &'static str) -> (Arc<BiometricsFingerprint>, FakeDevice, Arc<MemoryProperties>) {
    let device = FakeDevice::default();
    let opener = FakeOpener { class_name, device: Mutex::new(Some(device.clone())) };
    let props = Arc::new(MemoryProperties::new());
    let bridge = BiometricsFingerprint::open(&opener, props.clone(), BoostNotifier::new(Box::new(NoPowerService)));
    (Arc::new(bridge), device, props)
}

fn authenticated_msg(fid: u32) -> FingerprintMsg {
    let mut bytes = [0u8; AUTH_TOKEN_LEN];
    bytes[0] = 1;
    FingerprintMsg {
        msg_type: FINGERPRINT_AUTHENTICATED,
        data: FingerprintMsgData {
            authenticated: FingerprintAuthenticated {
                finger: FingerId { gid: 0, fid },
                hat: HwAuthToken::from_bytes(&bytes),
            },
        },
    }
}

// ============================================================================
// Socket client
// ============================================================================

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    next_id: u64,
}

impl Client {
    async fn connect(path: &std::path::Path) -> Self {
        let stream = UnixStream::connect(path).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self { lines: BufReader::new(reader).lines(), writer, next_id: 1 }
    }

    async fn next_message(&mut self) -> ServerMessage {
        let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for the server")
            .unwrap()
            .expect("server closed the connection");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, request: Request) -> Response {
        let id = self.next_id;
        self.next_id += 1;
        let mut json = serde_json::to_vec(&RequestEnvelope::with_id(request, id)).unwrap();
        json.push(b'\n');
        self.writer.write_all(&json).await.unwrap();

        match self.next_message().await {
            ServerMessage::Response(envelope) => {
                assert_eq!(envelope.id, id);
                envelope.response
            }
            other => panic!("expected a response, got {:?}", other),
        }
    }

    async fn status(&mut self, request: Request) -> RequestStatus {
        match self.request(request).await {
            Response::Ok(data) => data.request_status.expect("status response"),
            Response::Error { message } => panic!("request failed: {}", message),
        }
    }
}

/// Serve `bridge` on a fresh socket until the returned sender is dropped
async fn start_server(bridge: Arc<BiometricsFingerprint>) -> (TempDir, std::path::PathBuf, tokio::sync::oneshot::Sender<()>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fingerprintd");
    let listener = server::bind_socket(&path).unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(server::serve(listener, bridge, async move {
        let _ = stop_rx.await;
    }));
    (dir, path, stop_tx)
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_open_picks_first_working_module() {
    let (bridge, _, props) = open_bridge("goodix_fod");
    assert_eq!(bridge.class_name(), Some("goodix_fod"));
    assert!(bridge.is_udfps(0));
    assert_eq!(props.get("persist.vendor.sys.fp.vendor").as_deref(), Some("goodix_fod"));

    let (bridge, _, _) = open_bridge("silead");
    assert!(!bridge.is_udfps(0));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_requests_over_socket() {
    let (bridge, device, _) = open_bridge("fpc");
    let (_dir, path, _stop) = start_server(bridge).await;
    let mut client = Client::connect(&path).await;

    assert!(matches!(client.request(Request::Ping).await, Response::Ok(_)));

    match client.request(Request::PreEnroll).await {
        Response::Ok(data) => assert_eq!(data.value, Some(0xc0ffee)),
        other => panic!("unexpected {:?}", other),
    }

    let mut hat = vec![0u8; AUTH_TOKEN_LEN];
    hat[0] = 1;
    assert_eq!(client.status(Request::Enroll { hat, gid: 0, timeout_sec: 60 }).await, RequestStatus::SysOk);
    assert_eq!(client.status(Request::Cancel).await, RequestStatus::SysEbusy);
    assert_eq!(client.status(Request::Remove { gid: 0, fid: 3 }).await, RequestStatus::SysOk);

    match client.request(Request::IsUdfps { sensor_id: 0 }).await {
        Response::Ok(data) => assert_eq!(data.udfps, Some(false)),
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(
        *device.calls.lock(),
        vec!["pre_enroll".to_string(), "enroll v1 gid=0 timeout=60".into(), "cancel".into(), "remove gid=0 fid=3".into()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_requests_are_rejected() {
    let (bridge, device, _) = open_bridge("fpc");
    let (_dir, path, _stop) = start_server(bridge).await;
    let mut client = Client::connect(&path).await;

    let short = Request::Enroll { hat: vec![0; 12], gid: 0, timeout_sec: 60 };
    assert!(matches!(client.request(short).await, Response::Error { .. }));

    let empty = Request::SetActiveGroup { gid: 0, store_path: String::new() };
    assert_eq!(client.status(empty).await, RequestStatus::SysEinval);

    let missing = Request::SetActiveGroup { gid: 0, store_path: "/nonexistent/fpdata".into() };
    assert_eq!(client.status(missing).await, RequestStatus::SysEinval);

    let dir = TempDir::new().unwrap();
    let writable = Request::SetActiveGroup { gid: 0, store_path: dir.path().to_string_lossy().into_owned() };
    assert_eq!(client.status(writable).await, RequestStatus::SysOk);

    let calls = device.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("set_active_group gid=0"));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_driver_callbacks_reach_subscribed_client() {
    let (bridge, _, _) = open_bridge("goodix");
    registry::register(bridge.clone());
    let (_dir, path, _stop) = start_server(bridge).await;
    let mut client = Client::connect(&path).await;

    match client.request(Request::SetNotify).await {
        Response::Ok(data) => assert_eq!(data.value, Some(DEVICE_ID)),
        other => panic!("unexpected {:?}", other),
    }

    let matched = authenticated_msg(4);
    let rejected = authenticated_msg(0);
    unsafe {
        registry::notify_trampoline(&matched);
        registry::notify_trampoline(&rejected);
    }

    match client.next_message().await {
        ServerMessage::Event(ClientEvent::Authenticated { device_id, finger_id, token, .. }) => {
            assert_eq!(device_id, DEVICE_ID);
            assert_eq!(finger_id, 4);
            assert_eq!(token.len(), AUTH_TOKEN_LEN);
            assert_eq!(token[0], 1);
        }
        other => panic!("unexpected {:?}", other),
    }
    match client.next_message().await {
        ServerMessage::Event(ClientEvent::Authenticated { finger_id, token, .. }) => {
            assert_eq!(finger_id, 0);
            assert!(token.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }

    registry::unregister();
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_disconnect_drops_subscription() {
    let (bridge, _, _) = open_bridge("syna");
    registry::register(bridge.clone());
    let (_dir, path, _stop) = start_server(bridge.clone()).await;

    let mut first = Client::connect(&path).await;
    assert!(matches!(first.request(Request::SetNotify).await, Response::Ok(_)));
    assert!(bridge.has_client_callback());
    drop(first);

    // the server clears the subscription once it sees the hangup
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while bridge.has_client_callback() {
        assert!(tokio::time::Instant::now() < deadline, "subscription survived the disconnect");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // nobody is listening now: the message is dropped
    let canceled = FingerprintMsg { msg_type: FINGERPRINT_ERROR, data: FingerprintMsgData { error: 5 } };
    unsafe { registry::notify_trampoline(&canceled) };

    let mut second = Client::connect(&path).await;
    assert!(matches!(second.request(Request::SetNotify).await, Response::Ok(_)));

    let lockout = FingerprintMsg { msg_type: FINGERPRINT_ERROR, data: FingerprintMsgData { error: 7 } };
    unsafe { registry::notify_trampoline(&lockout) };

    // only the message sent after subscribing arrives
    match second.next_message().await {
        ServerMessage::Event(ClientEvent::Error { error, vendor_code, .. }) => {
            assert_eq!(error, rp_protocol::FingerprintError::Lockout);
            assert_eq!(vendor_code, 0);
        }
        other => panic!("unexpected {:?}", other),
    }

    registry::unregister();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bridge_without_module_still_answers() {
    let opener = FakeOpener { class_name: "none", device: Mutex::new(None) };
    let bridge = Arc::new(BiometricsFingerprint::open(
        &opener,
        Arc::new(MemoryProperties::new()),
        BoostNotifier::new(Box::new(NoPowerService)),
    ));
    let (_dir, path, _stop) = start_server(bridge).await;
    let mut client = Client::connect(&path).await;

    assert_eq!(client.status(Request::Authenticate { operation_id: 1, gid: 0 }).await, RequestStatus::SysUnknown);
    match client.request(Request::SetNotify).await {
        Response::Ok(data) => assert_eq!(data.value, Some(0)),
        other => panic!("unexpected {:?}", other),
    }
}
