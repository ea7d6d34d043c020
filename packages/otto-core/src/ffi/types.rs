//! # Raw FFI Types
//!
//! C-compatible types shared by the native call table and its
//! implementations. Nothing in here owns native memory.

use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::{c_char, c_int, c_void};

use crate::error::{Error, Result};

// ============================================================================
// STATUS CODES
// ============================================================================

/// Status code returned by every fallible Otto function.
///
/// `0` means success; every other value is a library-specific failure code
/// that can be resolved to text with [`OttoApi::error_text`](super::OttoApi::error_text).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub c_int);

impl StatusCode {
    /// The success sentinel.
    pub const OK: StatusCode = StatusCode(0);

    /// Whether this is the success sentinel.
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    /// The raw integer value.
    pub fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for StatusCode {
    fn from(value: i32) -> Self {
        StatusCode(value)
    }
}

// ============================================================================
// HANDLES
// ============================================================================

/// An opaque native-side reference.
///
/// Never dereferenced by the binding; only passed back into native calls.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(*mut c_void);

impl RawHandle {
    /// The null handle (an empty output slot, or a released handle).
    pub const fn null() -> Self {
        RawHandle(std::ptr::null_mut())
    }

    /// Wrap a pointer returned by the library.
    pub const fn from_ptr(ptr: *mut c_void) -> Self {
        RawHandle(ptr)
    }

    /// Build a handle from a plain address.
    ///
    /// Used by simulated libraries that hand out synthetic handles.
    pub fn from_addr(addr: usize) -> Self {
        RawHandle(addr as *mut c_void)
    }

    /// Whether this is the null handle.
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// The underlying pointer.
    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }

    /// The underlying address.
    pub fn addr(self) -> usize {
        self.0 as usize
    }

    /// Pointer to this slot, for use as a C out-parameter.
    pub(crate) fn as_out_ptr(&mut self) -> *mut *mut c_void {
        &mut self.0
    }
}

impl Default for RawHandle {
    fn default() -> Self {
        Self::null()
    }
}

// ============================================================================
// CALLBACKS & STRUCTS
// ============================================================================

/// Signature of the native log callback.
///
/// Arguments: instance id, timestamp, log level (1..=4), message, and the
/// user-data pointer registered together with the callback. All strings are
/// NUL-terminated UTF-8 and only valid for the duration of the call.
pub type RawLogCallback = unsafe extern "C" fn(
    instance_id: *const c_char,
    timestamp: *const c_char,
    level: c_int,
    message: *const c_char,
    user_data: *mut c_void,
);

/// Version tag the library expects in [`RawProxyConfig::version`].
pub const PROXY_CONFIG_VERSION: c_int = 1;

/// C layout of the proxy configuration struct.
#[repr(C)]
#[derive(Debug)]
pub struct RawProxyConfig {
    /// Struct version, always [`PROXY_CONFIG_VERSION`]
    pub version: c_int,
    /// Proxy URL, e.g. `proxy.example.org:3128`
    pub url: *const c_char,
    /// User name, may be null
    pub user_name: *const c_char,
    /// Password, may be null
    pub password: *const c_char,
    /// Authentication method name (e.g. `Basic`, `NTLM`), may be null
    pub auth_method: *const c_char,
}

// ============================================================================
// STRING MARSHALING
// ============================================================================

/// Convert a Rust string into a NUL-terminated C string.
///
/// Fails with [`Error::InvalidArgument`] on an interior NUL byte, before
/// anything is handed to the library.
pub(crate) fn to_cstring(value: &str, what: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| Error::InvalidArgument(format!("{} contains a NUL byte", what)))
}

/// Like [`to_cstring`], passing `None` through as a null argument.
pub(crate) fn to_opt_cstring(value: Option<&str>, what: &str) -> Result<Option<CString>> {
    value.map(|v| to_cstring(v, what)).transpose()
}

/// Convert a path into a UTF-8 C string.
///
/// The library takes UTF-8 paths regardless of the host encoding, so a
/// non-UTF-8 path is rejected rather than converted lossily.
pub(crate) fn path_to_cstring(path: &std::path::Path, what: &str) -> Result<CString> {
    let s = path
        .to_str()
        .ok_or_else(|| Error::InvalidArgument(format!("{} is not valid UTF-8", what)))?;
    to_cstring(s, what)
}

/// Borrow an optional C string as a raw pointer (null for `None`).
pub(crate) fn opt_ptr(value: Option<&CStr>) -> *const c_char {
    value.map_or(std::ptr::null(), CStr::as_ptr)
}

/// Read a C string the library handed us, replacing invalid UTF-8.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string valid for the
/// duration of this call.
pub(crate) unsafe fn lossy_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}
