//! # Native Call Table
//!
//! The [`OttoApi`] trait is the seam between the safe wrappers and the
//! native library. Every logical Otto operation is one method; each returns
//! a [`StatusCode`] and writes results into caller-supplied output slots,
//! exactly like the C ABI it mirrors.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          CALL TABLE                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Instance ──► Certificate ──► Checksum ──► sign ──► Send ──► finalize   │
//! │      │             │                                                    │
//! │      │             └────────► Receive ──► continue … (size 0 = end)     │
//! │      │                                                                  │
//! │      └──► Return Buffer (size / content / release)                      │
//! │                                                                         │
//! │  Implementations:                                                       │
//! │    DynamicLibrary  - libotto loaded at runtime                          │
//! │    MockOtto        - in-memory simulator (feature "testing")            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Methods taking a [`RawHandle`] are `unsafe`: the caller guarantees that
//! the handle was produced by this library, is still live and is not used
//! concurrently from another thread.

use std::ffi::CStr;
use std::os::raw::c_void;

use super::types::{RawHandle, RawLogCallback, RawProxyConfig, StatusCode};

/// One method per native Otto function.
pub trait OttoApi: Send + Sync {
    // ------------------------------------------------------------------------
    // Instance
    // ------------------------------------------------------------------------

    /// Create an instance. `log_dir` of `None` lets the library pick the
    /// temp directory. `user_data` is handed back to `callback` verbatim.
    ///
    /// # Safety
    /// `user_data` must stay valid for as long as the instance lives.
    unsafe fn instance_create(
        &self,
        log_dir: Option<&CStr>,
        callback: Option<RawLogCallback>,
        user_data: *mut c_void,
        instance: &mut RawHandle,
    ) -> StatusCode;

    /// Release an instance.
    ///
    /// # Safety
    /// `instance` must be live.
    unsafe fn instance_release(&self, instance: RawHandle) -> StatusCode;

    // ------------------------------------------------------------------------
    // Certificate
    // ------------------------------------------------------------------------

    /// Open a certificate from a token path (or an eID-client URL, in which
    /// case `password` is null).
    ///
    /// # Safety
    /// `instance` must be live.
    unsafe fn certificate_open(
        &self,
        instance: RawHandle,
        path: Option<&CStr>,
        password: Option<&CStr>,
        certificate: &mut RawHandle,
    ) -> StatusCode;

    /// Close a certificate.
    ///
    /// # Safety
    /// `certificate` must be live.
    unsafe fn certificate_close(&self, certificate: RawHandle) -> StatusCode;

    // ------------------------------------------------------------------------
    // Return buffer
    // ------------------------------------------------------------------------

    /// Create a return buffer.
    ///
    /// # Safety
    /// `instance` must be live.
    unsafe fn buffer_create(&self, instance: RawHandle, buffer: &mut RawHandle) -> StatusCode;

    /// Number of bytes currently held by the buffer.
    ///
    /// # Safety
    /// `buffer` must be live.
    unsafe fn buffer_size(&self, buffer: RawHandle) -> u64;

    /// Pointer to the buffer contents (may be null). Valid until the next
    /// native call that writes into this buffer, or its release.
    ///
    /// # Safety
    /// `buffer` must be live.
    unsafe fn buffer_content(&self, buffer: RawHandle) -> *const u8;

    /// Release a return buffer.
    ///
    /// # Safety
    /// `buffer` must be live.
    unsafe fn buffer_release(&self, buffer: RawHandle) -> StatusCode;

    // ------------------------------------------------------------------------
    // Checksum
    // ------------------------------------------------------------------------

    /// Create a checksum accumulator.
    ///
    /// # Safety
    /// `instance` must be live.
    unsafe fn checksum_create(&self, instance: RawHandle, checksum: &mut RawHandle) -> StatusCode;

    /// Feed a block of bytes into the accumulator.
    ///
    /// # Safety
    /// `checksum` must be live.
    unsafe fn checksum_update(&self, checksum: RawHandle, block: &[u8]) -> StatusCode;

    /// Sign the accumulated checksum, writing the base64 signature into `buffer`.
    ///
    /// # Safety
    /// All handles must be live.
    unsafe fn checksum_sign(
        &self,
        checksum: RawHandle,
        certificate: RawHandle,
        buffer: RawHandle,
    ) -> StatusCode;

    /// Release a checksum accumulator.
    ///
    /// # Safety
    /// `checksum` must be live.
    unsafe fn checksum_release(&self, checksum: RawHandle) -> StatusCode;

    // ------------------------------------------------------------------------
    // Send
    // ------------------------------------------------------------------------

    /// Begin a send session.
    ///
    /// # Safety
    /// `instance` must be live.
    unsafe fn send_begin(
        &self,
        instance: RawHandle,
        signed_checksum: &CStr,
        vendor_id: &CStr,
        send: &mut RawHandle,
    ) -> StatusCode;

    /// Push the next block of the object.
    ///
    /// # Safety
    /// `send` must be live.
    unsafe fn send_continue(&self, send: RawHandle, block: &[u8]) -> StatusCode;

    /// Finalize the upload, writing the remote object id into `object_id`.
    ///
    /// # Safety
    /// Both handles must be live.
    unsafe fn send_finalize(&self, send: RawHandle, object_id: RawHandle) -> StatusCode;

    /// End (release) a send session.
    ///
    /// # Safety
    /// `send` must be live.
    unsafe fn send_end(&self, send: RawHandle) -> StatusCode;

    // ------------------------------------------------------------------------
    // Receive
    // ------------------------------------------------------------------------

    /// Begin a receive session. With a `pickup_certificate` the server
    /// re-encrypts the object for that certificate and the library hands the
    /// ciphertext through undecrypted.
    ///
    /// # Safety
    /// `instance` and `certificate` must be live.
    unsafe fn receive_begin(
        &self,
        instance: RawHandle,
        object_id: &CStr,
        certificate: RawHandle,
        vendor_id: &CStr,
        pickup_certificate: Option<&CStr>,
        receive: &mut RawHandle,
    ) -> StatusCode;

    /// Fetch the next block into `buffer`. A block of size zero marks the end.
    ///
    /// # Safety
    /// Both handles must be live.
    unsafe fn receive_continue(&self, receive: RawHandle, buffer: RawHandle) -> StatusCode;

    /// End (release) a receive session.
    ///
    /// # Safety
    /// `receive` must be live.
    unsafe fn receive_end(&self, receive: RawHandle) -> StatusCode;

    /// Fetch a whole object in one call into `buffer`.
    ///
    /// # Safety
    /// `instance` and `buffer` must be live.
    #[allow(clippy::too_many_arguments)]
    unsafe fn fetch_data(
        &self,
        instance: RawHandle,
        object_id: &CStr,
        expected_size: u32,
        certificate_path: Option<&CStr>,
        password: Option<&CStr>,
        vendor_id: &CStr,
        pickup_certificate: Option<&CStr>,
        buffer: RawHandle,
    ) -> StatusCode;

    // ------------------------------------------------------------------------
    // Miscellaneous
    // ------------------------------------------------------------------------

    /// Plain-text message for a status code, if the library has one.
    fn error_text(&self, status: StatusCode) -> Option<String>;

    /// Configure (or with `None`, clear) the proxy for an instance.
    ///
    /// # Safety
    /// `instance` must be live; the pointers inside `proxy` must be valid
    /// for the duration of the call.
    unsafe fn set_proxy(&self, instance: RawHandle, proxy: Option<&RawProxyConfig>) -> StatusCode;

    /// Set an instance setting.
    ///
    /// # Safety
    /// `instance` must be live.
    unsafe fn setting_set(&self, instance: RawHandle, name: &CStr, value: &CStr) -> StatusCode;

    /// Read an instance setting into `buffer`.
    ///
    /// # Safety
    /// Both handles must be live.
    unsafe fn setting_get(&self, instance: RawHandle, name: &CStr, buffer: RawHandle) -> StatusCode;

    /// Write the library version into `buffer`.
    ///
    /// # Safety
    /// `buffer` must be live.
    unsafe fn version(&self, buffer: RawHandle) -> StatusCode;
}
