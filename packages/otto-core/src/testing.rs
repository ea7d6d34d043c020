//! # Testing Utilities
//!
//! [`MockOtto`] is an in-memory [`OttoApi`] that behaves like a small
//! OTTER endpoint: objects sent through it can be received again.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           MOCK OTTO                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  handles    synthetic addresses (0x1000, 0x1010, ...) → Resource        │
//! │  objects    object id → bytes  ("obj-42", "obj-43", ...)                │
//! │  calls      per-Op call counters                                        │
//! │  failures   per-Op injected status codes                                │
//! │  texts      status code → error text                                    │
//! │  chunks     block sizes handed out by receive_continue                  │
//! │                                                                         │
//! │  Releasing an unknown or already released handle returns               │
//! │  UNKNOWN_HANDLE; double releases are counted.                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```ignore
//! let mock = MockOtto::shared();
//! mock.set_error_text(7, "checksum mismatch");
//! let instance = Instance::create(mock.clone(), None)?;
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::{CStr, CString};
use std::os::raw::c_void;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ProxyConfig;
use crate::ffi::{lossy_string, OttoApi, RawHandle, RawLogCallback, RawProxyConfig, StatusCode};
use crate::log::LogLevel;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Status for a handle the mock does not know (or already released)
pub const UNKNOWN_HANDLE: i32 = 2;
/// Status for a wrong certificate PIN
pub const WRONG_PIN: i32 = 4;
/// Status for a call that is invalid in the resource's current state
pub const INVALID_STATE: i32 = 5;
/// Status when the sent data does not match the signed checksum
pub const CHECKSUM_MISMATCH: i32 = 7;
/// Status for an object id the mock does not hold
pub const UNKNOWN_OBJECT: i32 = 13;
/// Status for an unknown setting name
pub const UNKNOWN_SETTING: i32 = 16;

/// Version string reported by the mock
pub const MOCK_VERSION: &str = "1.0.0-mock";

/// Id assigned to the first object sent through a fresh mock
pub const FIRST_OBJECT_ID: u64 = 42;

/// Block size used once the configured chunk sizes are exhausted
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

const FIRST_HANDLE: usize = 0x1000;
const HANDLE_STRIDE: usize = 0x10;

/// A native operation, for call counting and failure injection.
///
/// One variant per [`OttoApi`] method.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    InstanceCreate,
    InstanceRelease,
    CertificateOpen,
    CertificateClose,
    BufferCreate,
    BufferSize,
    BufferContent,
    BufferRelease,
    ChecksumCreate,
    ChecksumUpdate,
    ChecksumSign,
    ChecksumRelease,
    SendBegin,
    SendContinue,
    SendFinalize,
    SendEnd,
    ReceiveBegin,
    ReceiveContinue,
    ReceiveEnd,
    FetchData,
    ErrorText,
    SetProxy,
    SettingSet,
    SettingGet,
    Version,
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Instance,
    Certificate,
    Buffer,
    Checksum,
    Send,
    Receive,
}

enum Resource {
    Instance {
        callback: Option<RawLogCallback>,
        user_data: usize,
    },
    Certificate,
    Buffer(Vec<u8>),
    Checksum {
        data: Vec<u8>,
        signed: bool,
    },
    Send {
        signature: String,
        data: Vec<u8>,
        finalized: bool,
    },
    Receive {
        data: Vec<u8>,
        offset: usize,
        blocks: VecDeque<usize>,
    },
}

impl Resource {
    fn kind(&self) -> Kind {
        match self {
            Resource::Instance { .. } => Kind::Instance,
            Resource::Certificate => Kind::Certificate,
            Resource::Buffer(_) => Kind::Buffer,
            Resource::Checksum { .. } => Kind::Checksum,
            Resource::Send { .. } => Kind::Send,
            Resource::Receive { .. } => Kind::Receive,
        }
    }
}

type MockResult<T = ()> = std::result::Result<T, StatusCode>;

#[derive(Default)]
struct State {
    next_handle: usize,
    resources: HashMap<usize, Resource>,
    released: HashSet<usize>,
    double_releases: usize,
    calls: HashMap<Op, usize>,
    failures: HashMap<Op, i32>,
    texts: HashMap<i32, String>,
    objects: HashMap<String, Vec<u8>>,
    next_object_id: u64,
    chunk_sizes: Vec<usize>,
    expected_password: Option<String>,
    settings: HashMap<String, String>,
    proxy: Option<ProxyConfig>,
    last_log_dir: Option<String>,
    last_certificate: Option<(Option<String>, Option<String>)>,
    last_pickup_certificate: Option<String>,
}

impl State {
    fn alloc(&mut self, resource: Resource) -> RawHandle {
        let addr = FIRST_HANDLE + self.next_handle * HANDLE_STRIDE;
        self.next_handle += 1;
        self.resources.insert(addr, resource);
        RawHandle::from_addr(addr)
    }

    fn expect(&self, handle: RawHandle, kind: Kind) -> MockResult {
        match self.resources.get(&handle.addr()) {
            Some(resource) if resource.kind() == kind => Ok(()),
            _ => Err(StatusCode(UNKNOWN_HANDLE)),
        }
    }

    fn release(&mut self, handle: RawHandle, kind: Kind) -> MockResult {
        let addr = handle.addr();
        if self.resources.get(&addr).map(Resource::kind) == Some(kind) {
            self.resources.remove(&addr);
            self.released.insert(addr);
            return Ok(());
        }
        if self.released.contains(&addr) {
            self.double_releases += 1;
        }
        Err(StatusCode(UNKNOWN_HANDLE))
    }

    fn buffer_mut(&mut self, handle: RawHandle) -> MockResult<&mut Vec<u8>> {
        match self.resources.get_mut(&handle.addr()) {
            Some(Resource::Buffer(bytes)) => Ok(bytes),
            _ => Err(StatusCode(UNKNOWN_HANDLE)),
        }
    }

    fn write_buffer(&mut self, handle: RawHandle, bytes: &[u8]) -> MockResult {
        let buffer = self.buffer_mut(handle)?;
        buffer.clear();
        buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn check_password(&self, location: Option<&str>, password: Option<&str>) -> MockResult {
        let is_url =
            location.map_or(false, |l| l.starts_with("http://") || l.starts_with("https://"));
        match &self.expected_password {
            Some(expected) if !is_url && password != Some(expected.as_str()) => {
                Err(StatusCode(WRONG_PIN))
            }
            _ => Ok(()),
        }
    }

    fn block_plan(&self) -> VecDeque<usize> {
        self.chunk_sizes.iter().copied().collect()
    }
}

// ============================================================================
// MOCK OTTO
// ============================================================================

/// In-memory stand-in for the Otto library.
pub struct MockOtto {
    state: Mutex<State>,
}

impl Default for MockOtto {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOtto {
    /// A fresh mock with no objects.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_object_id: FIRST_OBJECT_ID,
                ..State::default()
            }),
        }
    }

    /// A fresh mock behind an `Arc`, ready for [`Instance::create`](crate::Instance::create).
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// The signature the mock produces for a checksum over `data`.
    pub fn signature_for(data: &[u8]) -> String {
        // FNV-1a
        let hash = data.iter().fold(0xcbf2_9ce4_8422_2325u64, |hash, &byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        });
        format!("MOCKSIG-{:016x}", hash)
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Register the error text for `code`.
    pub fn set_error_text(&self, code: i32, text: &str) {
        self.state.lock().texts.insert(code, text.to_string());
    }

    /// Make every call of `op` fail with `code`.
    pub fn fail(&self, op: Op, code: i32) {
        self.state.lock().failures.insert(op, code);
    }

    /// Stop failing `op`.
    pub fn clear_failure(&self, op: Op) {
        self.state.lock().failures.remove(&op);
    }

    /// Block sizes for receive sessions opened after this call. Once they
    /// run out, blocks of [`DEFAULT_BLOCK_SIZE`] follow until the data ends.
    pub fn set_chunk_sizes(&self, sizes: &[usize]) {
        self.state.lock().chunk_sizes = sizes.to_vec();
    }

    /// Require `password` when opening file certificates.
    pub fn expect_password(&self, password: &str) {
        self.state.lock().expected_password = Some(password.to_string());
    }

    /// Put an object on the simulated server.
    pub fn store_object(&self, object_id: &str, data: Vec<u8>) {
        self.state.lock().objects.insert(object_id.to_string(), data);
    }

    /// Overwrite the contents of a return buffer.
    pub fn fill_buffer(&self, buffer: RawHandle, bytes: &[u8]) {
        // Unknown buffers are ignored.
        let _ = self.state.lock().write_buffer(buffer, bytes);
    }

    /// Invoke the log callback of every live instance.
    pub fn emit_log(&self, level: LogLevel, message: &str) {
        let targets: Vec<(usize, RawLogCallback, usize)> = self
            .state
            .lock()
            .resources
            .iter()
            .filter_map(|(addr, resource)| match resource {
                Resource::Instance {
                    callback: Some(callback),
                    user_data,
                } => Some((*addr, *callback, *user_data)),
                _ => None,
            })
            .collect();

        let timestamp = CString::new("2026-01-01 00:00:00").unwrap_or_default();
        let message = CString::new(message).unwrap_or_default();
        for (addr, callback, user_data) in targets {
            let id = CString::new(format!("{:x}", addr)).unwrap_or_default();
            // SAFETY: user_data was registered together with the callback by
            // the owner of a live instance.
            unsafe {
                callback(
                    id.as_ptr(),
                    timestamp.as_ptr(),
                    level.as_raw(),
                    message.as_ptr(),
                    user_data as *mut c_void,
                );
            }
        }
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// How often `op` was called.
    pub fn calls(&self, op: Op) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of handles currently live.
    pub fn live_handles(&self) -> usize {
        self.state.lock().resources.len()
    }

    /// Number of releases of an already released handle.
    pub fn double_releases(&self) -> usize {
        self.state.lock().double_releases
    }

    /// Contents of a stored object.
    pub fn object(&self, object_id: &str) -> Option<Vec<u8>> {
        self.state.lock().objects.get(object_id).cloned()
    }

    /// The current proxy configuration.
    pub fn proxy(&self) -> Option<ProxyConfig> {
        self.state.lock().proxy.clone()
    }

    /// Log directory passed to the last instance creation.
    pub fn last_log_dir(&self) -> Option<String> {
        self.state.lock().last_log_dir.clone()
    }

    /// Path and password passed to the last certificate open.
    pub fn last_certificate(&self) -> Option<(Option<String>, Option<String>)> {
        self.state.lock().last_certificate.clone()
    }

    /// Pickup certificate passed to the last receive or fetch.
    pub fn last_pickup_certificate(&self) -> Option<String> {
        self.state.lock().last_pickup_certificate.clone()
    }

    fn run<T>(&self, op: Op, f: impl FnOnce(&mut State) -> MockResult<T>) -> MockResult<T> {
        let mut state = self.state.lock();
        *state.calls.entry(op).or_insert(0) += 1;
        if let Some(&code) = state.failures.get(&op) {
            return Err(StatusCode(code));
        }
        f(&mut state)
    }

    fn status(&self, op: Op, f: impl FnOnce(&mut State) -> MockResult) -> StatusCode {
        match self.run(op, f) {
            Ok(()) => StatusCode::OK,
            Err(status) => status,
        }
    }
}

fn owned(value: Option<&CStr>) -> Option<String> {
    value.map(|v| v.to_string_lossy().into_owned())
}

impl OttoApi for MockOtto {
    unsafe fn instance_create(
        &self,
        log_dir: Option<&CStr>,
        callback: Option<RawLogCallback>,
        user_data: *mut c_void,
        instance: &mut RawHandle,
    ) -> StatusCode {
        let status = self.status(Op::InstanceCreate, |state| {
            state.last_log_dir = owned(log_dir);
            *instance = state.alloc(Resource::Instance {
                callback,
                user_data: user_data as usize,
            });
            Ok(())
        });
        if status.is_ok() {
            self.emit_log(LogLevel::Info, "Otto-Instanz erzeugt");
        }
        status
    }

    unsafe fn instance_release(&self, instance: RawHandle) -> StatusCode {
        self.status(Op::InstanceRelease, |state| state.release(instance, Kind::Instance))
    }

    unsafe fn certificate_open(
        &self,
        instance: RawHandle,
        path: Option<&CStr>,
        password: Option<&CStr>,
        certificate: &mut RawHandle,
    ) -> StatusCode {
        self.status(Op::CertificateOpen, |state| {
            state.expect(instance, Kind::Instance)?;
            let path = owned(path);
            let password = owned(password);
            state.last_certificate = Some((path.clone(), password.clone()));
            state.check_password(path.as_deref(), password.as_deref())?;
            *certificate = state.alloc(Resource::Certificate);
            Ok(())
        })
    }

    unsafe fn certificate_close(&self, certificate: RawHandle) -> StatusCode {
        self.status(Op::CertificateClose, |state| state.release(certificate, Kind::Certificate))
    }

    unsafe fn buffer_create(&self, instance: RawHandle, buffer: &mut RawHandle) -> StatusCode {
        self.status(Op::BufferCreate, |state| {
            state.expect(instance, Kind::Instance)?;
            *buffer = state.alloc(Resource::Buffer(Vec::new()));
            Ok(())
        })
    }

    unsafe fn buffer_size(&self, buffer: RawHandle) -> u64 {
        self.run(Op::BufferSize, |state| Ok(state.buffer_mut(buffer)?.len() as u64))
            .unwrap_or(0)
    }

    unsafe fn buffer_content(&self, buffer: RawHandle) -> *const u8 {
        // The pointer stays valid until the buffer is written or released.
        self.run(Op::BufferContent, |state| Ok(state.buffer_mut(buffer)?.as_ptr()))
            .unwrap_or(std::ptr::null())
    }

    unsafe fn buffer_release(&self, buffer: RawHandle) -> StatusCode {
        self.status(Op::BufferRelease, |state| state.release(buffer, Kind::Buffer))
    }

    unsafe fn checksum_create(&self, instance: RawHandle, checksum: &mut RawHandle) -> StatusCode {
        self.status(Op::ChecksumCreate, |state| {
            state.expect(instance, Kind::Instance)?;
            *checksum = state.alloc(Resource::Checksum {
                data: Vec::new(),
                signed: false,
            });
            Ok(())
        })
    }

    unsafe fn checksum_update(&self, checksum: RawHandle, block: &[u8]) -> StatusCode {
        self.status(Op::ChecksumUpdate, |state| match state.resources.get_mut(&checksum.addr()) {
            Some(Resource::Checksum { signed: true, .. }) => Err(StatusCode(INVALID_STATE)),
            Some(Resource::Checksum { data, .. }) => {
                data.extend_from_slice(block);
                Ok(())
            }
            _ => Err(StatusCode(UNKNOWN_HANDLE)),
        })
    }

    unsafe fn checksum_sign(
        &self,
        checksum: RawHandle,
        certificate: RawHandle,
        buffer: RawHandle,
    ) -> StatusCode {
        self.status(Op::ChecksumSign, |state| {
            state.expect(certificate, Kind::Certificate)?;
            state.buffer_mut(buffer)?;
            let signature = match state.resources.get_mut(&checksum.addr()) {
                Some(Resource::Checksum { data, signed }) => {
                    *signed = true;
                    MockOtto::signature_for(data)
                }
                _ => return Err(StatusCode(UNKNOWN_HANDLE)),
            };
            state.write_buffer(buffer, signature.as_bytes())
        })
    }

    unsafe fn checksum_release(&self, checksum: RawHandle) -> StatusCode {
        self.status(Op::ChecksumRelease, |state| state.release(checksum, Kind::Checksum))
    }

    unsafe fn send_begin(
        &self,
        instance: RawHandle,
        signed_checksum: &CStr,
        _vendor_id: &CStr,
        send: &mut RawHandle,
    ) -> StatusCode {
        self.status(Op::SendBegin, |state| {
            state.expect(instance, Kind::Instance)?;
            *send = state.alloc(Resource::Send {
                signature: signed_checksum.to_string_lossy().into_owned(),
                data: Vec::new(),
                finalized: false,
            });
            Ok(())
        })
    }

    unsafe fn send_continue(&self, send: RawHandle, block: &[u8]) -> StatusCode {
        self.status(Op::SendContinue, |state| match state.resources.get_mut(&send.addr()) {
            Some(Resource::Send { finalized: true, .. }) => Err(StatusCode(INVALID_STATE)),
            Some(Resource::Send { data, .. }) => {
                data.extend_from_slice(block);
                Ok(())
            }
            _ => Err(StatusCode(UNKNOWN_HANDLE)),
        })
    }

    unsafe fn send_finalize(&self, send: RawHandle, object_id: RawHandle) -> StatusCode {
        self.status(Op::SendFinalize, |state| {
            state.buffer_mut(object_id)?;
            let data = match state.resources.get_mut(&send.addr()) {
                Some(Resource::Send {
                    finalized: true, ..
                }) => return Err(StatusCode(INVALID_STATE)),
                Some(Resource::Send {
                    signature,
                    data,
                    finalized,
                }) => {
                    if *signature != MockOtto::signature_for(data) {
                        return Err(StatusCode(CHECKSUM_MISMATCH));
                    }
                    *finalized = true;
                    data.clone()
                }
                _ => return Err(StatusCode(UNKNOWN_HANDLE)),
            };
            let id = format!("obj-{}", state.next_object_id);
            state.next_object_id += 1;
            state.objects.insert(id.clone(), data);
            state.write_buffer(object_id, id.as_bytes())
        })
    }

    unsafe fn send_end(&self, send: RawHandle) -> StatusCode {
        self.status(Op::SendEnd, |state| state.release(send, Kind::Send))
    }

    unsafe fn receive_begin(
        &self,
        instance: RawHandle,
        object_id: &CStr,
        certificate: RawHandle,
        _vendor_id: &CStr,
        pickup_certificate: Option<&CStr>,
        receive: &mut RawHandle,
    ) -> StatusCode {
        self.status(Op::ReceiveBegin, |state| {
            state.expect(instance, Kind::Instance)?;
            state.expect(certificate, Kind::Certificate)?;
            state.last_pickup_certificate = owned(pickup_certificate);
            let data = state
                .objects
                .get(&*object_id.to_string_lossy())
                .cloned()
                .ok_or(StatusCode(UNKNOWN_OBJECT))?;
            let blocks = state.block_plan();
            *receive = state.alloc(Resource::Receive {
                data,
                offset: 0,
                blocks,
            });
            Ok(())
        })
    }

    unsafe fn receive_continue(&self, receive: RawHandle, buffer: RawHandle) -> StatusCode {
        self.status(Op::ReceiveContinue, |state| {
            state.buffer_mut(buffer)?;
            let block = match state.resources.get_mut(&receive.addr()) {
                Some(Resource::Receive {
                    data,
                    offset,
                    blocks,
                }) => {
                    let remaining = data.len() - *offset;
                    let size = blocks.pop_front().unwrap_or(DEFAULT_BLOCK_SIZE).min(remaining);
                    let block = data[*offset..*offset + size].to_vec();
                    *offset += size;
                    block
                }
                _ => return Err(StatusCode(UNKNOWN_HANDLE)),
            };
            state.write_buffer(buffer, &block)
        })
    }

    unsafe fn receive_end(&self, receive: RawHandle) -> StatusCode {
        self.status(Op::ReceiveEnd, |state| state.release(receive, Kind::Receive))
    }

    unsafe fn fetch_data(
        &self,
        instance: RawHandle,
        object_id: &CStr,
        _expected_size: u32,
        certificate_path: Option<&CStr>,
        password: Option<&CStr>,
        _vendor_id: &CStr,
        pickup_certificate: Option<&CStr>,
        buffer: RawHandle,
    ) -> StatusCode {
        self.status(Op::FetchData, |state| {
            state.expect(instance, Kind::Instance)?;
            state.check_password(owned(certificate_path).as_deref(), owned(password).as_deref())?;
            state.last_pickup_certificate = owned(pickup_certificate);
            let data = state
                .objects
                .get(&*object_id.to_string_lossy())
                .cloned()
                .ok_or(StatusCode(UNKNOWN_OBJECT))?;
            state.write_buffer(buffer, &data)
        })
    }

    fn error_text(&self, status: StatusCode) -> Option<String> {
        self.run(Op::ErrorText, |state| Ok(state.texts.get(&status.value()).cloned()))
            .ok()
            .flatten()
    }

    unsafe fn set_proxy(&self, instance: RawHandle, proxy: Option<&RawProxyConfig>) -> StatusCode {
        self.status(Op::SetProxy, |state| {
            state.expect(instance, Kind::Instance)?;
            state.proxy = match proxy {
                Some(raw) => Some(ProxyConfig {
                    url: lossy_string(raw.url).unwrap_or_default(),
                    user_name: lossy_string(raw.user_name),
                    password: lossy_string(raw.password),
                    auth_method: lossy_string(raw.auth_method),
                }),
                None => None,
            };
            Ok(())
        })
    }

    unsafe fn setting_set(&self, instance: RawHandle, name: &CStr, value: &CStr) -> StatusCode {
        self.status(Op::SettingSet, |state| {
            state.expect(instance, Kind::Instance)?;
            state.settings.insert(
                name.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            );
            Ok(())
        })
    }

    unsafe fn setting_get(
        &self,
        instance: RawHandle,
        name: &CStr,
        buffer: RawHandle,
    ) -> StatusCode {
        self.status(Op::SettingGet, |state| {
            state.expect(instance, Kind::Instance)?;
            let value = state
                .settings
                .get(&*name.to_string_lossy())
                .cloned()
                .ok_or(StatusCode(UNKNOWN_SETTING))?;
            state.write_buffer(buffer, value.as_bytes())
        })
    }

    unsafe fn version(&self, buffer: RawHandle) -> StatusCode {
        self.status(Op::Version, |state| state.write_buffer(buffer, MOCK_VERSION.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_deterministic() {
        assert_eq!(MockOtto::signature_for(b"hello"), MockOtto::signature_for(b"hello"));
        assert_ne!(MockOtto::signature_for(b"hello"), MockOtto::signature_for(b"hellp"));
    }

    #[test]
    fn test_double_release_counted() {
        let mock = MockOtto::new();
        let mut instance = RawHandle::null();
        unsafe {
            assert!(mock
                .instance_create(None, None, std::ptr::null_mut(), &mut instance)
                .is_ok());
            assert!(mock.instance_release(instance).is_ok());
            assert_eq!(mock.instance_release(instance), StatusCode(UNKNOWN_HANDLE));
        }
        assert_eq!(mock.double_releases(), 1);
        assert_eq!(mock.live_handles(), 0);
    }

    #[test]
    fn test_injected_failure_counts_call() {
        let mock = MockOtto::new();
        mock.fail(Op::InstanceCreate, 99);
        let mut instance = RawHandle::null();
        let status =
            unsafe { mock.instance_create(None, None, std::ptr::null_mut(), &mut instance) };
        assert_eq!(status, StatusCode(99));
        assert!(instance.is_null());
        assert_eq!(mock.calls(Op::InstanceCreate), 1);

        mock.clear_failure(Op::InstanceCreate);
        let status =
            unsafe { mock.instance_create(None, None, std::ptr::null_mut(), &mut instance) };
        assert!(status.is_ok());
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let mock = MockOtto::new();
        let mut instance = RawHandle::null();
        unsafe {
            mock.instance_create(None, None, std::ptr::null_mut(), &mut instance);
            assert_eq!(mock.buffer_release(instance), StatusCode(UNKNOWN_HANDLE));
        }
        assert_eq!(mock.live_handles(), 1);
    }
}
