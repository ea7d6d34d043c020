//! # Dynamic Library
//!
//! Loads the vendor-supplied Otto shared library at runtime and exposes it
//! through [`OttoApi`].
//!
//! All symbols are resolved when the library is loaded, so a library that
//! is missing a function fails early with [`Error::MissingSymbol`] instead of
//! at the first call.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;

use super::api::OttoApi;
use super::types::{lossy_string, opt_ptr, RawHandle, RawLogCallback, RawProxyConfig, StatusCode};
use crate::error::{Error, Result};

// ============================================================================
// FUNCTION SIGNATURES
// ============================================================================

type FnInstanceCreate = unsafe extern "C" fn(
    *const c_char,
    Option<RawLogCallback>,
    *mut c_void,
    *mut *mut c_void,
) -> StatusCode;
type FnRelease = unsafe extern "C" fn(*mut c_void) -> StatusCode;
type FnCertificateOpen =
    unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char, *mut *mut c_void) -> StatusCode;
type FnCreateFromInstance = unsafe extern "C" fn(*mut c_void, *mut *mut c_void) -> StatusCode;
type FnBufferSize = unsafe extern "C" fn(*mut c_void) -> u64;
type FnBufferContent = unsafe extern "C" fn(*mut c_void) -> *const c_char;
type FnPushBlock = unsafe extern "C" fn(*mut c_void, *const c_char, u64) -> StatusCode;
type FnChecksumSign = unsafe extern "C" fn(*mut c_void, *mut c_void, *mut c_void) -> StatusCode;
type FnSendBegin = unsafe extern "C" fn(
    *mut c_void,
    *const c_char,
    *const c_char,
    *mut *mut c_void,
) -> StatusCode;
type FnHandlePair = unsafe extern "C" fn(*mut c_void, *mut c_void) -> StatusCode;
type FnReceiveBegin = unsafe extern "C" fn(
    *mut c_void,
    *const c_char,
    *mut c_void,
    *const c_char,
    *mut *mut c_void,
) -> StatusCode;
type FnReceiveBeginPickup = unsafe extern "C" fn(
    *mut c_void,
    *const c_char,
    *mut c_void,
    *const c_char,
    *const c_char,
    *mut *mut c_void,
) -> StatusCode;
type FnFetchData = unsafe extern "C" fn(
    *mut c_void,
    *const c_char,
    u32,
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    *mut c_void,
) -> StatusCode;
type FnErrorText = unsafe extern "C" fn(c_int) -> *const c_char;
type FnSetProxy = unsafe extern "C" fn(*mut c_void, *const RawProxyConfig) -> StatusCode;
type FnSettingSet = unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char) -> StatusCode;
type FnSettingGet = unsafe extern "C" fn(*mut c_void, *const c_char, *mut c_void) -> StatusCode;
type FnVersion = unsafe extern "C" fn(*mut c_void) -> StatusCode;

/// Resolved function pointers. Only valid while the owning [`Library`] is loaded.
struct Functions {
    instance_create: FnInstanceCreate,
    instance_release: FnRelease,
    certificate_open: FnCertificateOpen,
    certificate_close: FnRelease,
    buffer_create: FnCreateFromInstance,
    buffer_size: FnBufferSize,
    buffer_content: FnBufferContent,
    buffer_release: FnRelease,
    checksum_create: FnCreateFromInstance,
    checksum_update: FnPushBlock,
    checksum_sign: FnChecksumSign,
    checksum_release: FnRelease,
    send_begin: FnSendBegin,
    send_continue: FnPushBlock,
    send_finalize: FnHandlePair,
    send_end: FnRelease,
    receive_begin: FnReceiveBegin,
    receive_begin_pickup: FnReceiveBeginPickup,
    receive_continue: FnHandlePair,
    receive_end: FnRelease,
    fetch_data: FnFetchData,
    error_text: FnErrorText,
    set_proxy: FnSetProxy,
    setting_set: FnSettingSet,
    setting_get: FnSettingGet,
    version: FnVersion,
}

macro_rules! resolve {
    ($lib:expr, $name:literal, $ty:ty) => {{
        // SAFETY: the signature matches the declaration in otto.h.
        let symbol = unsafe { $lib.get::<$ty>(concat!($name, "\0").as_bytes()) }
            .map_err(|_| Error::MissingSymbol($name.to_string()))?;
        *symbol
    }};
}

impl Functions {
    fn resolve(lib: &Library) -> Result<Self> {
        Ok(Self {
            instance_create: resolve!(lib, "OttoInstanzErzeugen", FnInstanceCreate),
            instance_release: resolve!(lib, "OttoInstanzFreigeben", FnRelease),
            certificate_open: resolve!(lib, "OttoZertifikatOeffnen", FnCertificateOpen),
            certificate_close: resolve!(lib, "OttoZertifikatSchliessen", FnRelease),
            buffer_create: resolve!(lib, "OttoRueckgabepufferErzeugen", FnCreateFromInstance),
            buffer_size: resolve!(lib, "OttoRueckgabepufferGroesse", FnBufferSize),
            buffer_content: resolve!(lib, "OttoRueckgabepufferInhalt", FnBufferContent),
            buffer_release: resolve!(lib, "OttoRueckgabepufferFreigeben", FnRelease),
            checksum_create: resolve!(lib, "OttoPruefsummeErzeugen", FnCreateFromInstance),
            checksum_update: resolve!(lib, "OttoPruefsummeAktualisieren", FnPushBlock),
            checksum_sign: resolve!(lib, "OttoPruefsummeSignieren", FnChecksumSign),
            checksum_release: resolve!(lib, "OttoPruefsummeFreigeben", FnRelease),
            send_begin: resolve!(lib, "OttoVersandBeginnen", FnSendBegin),
            send_continue: resolve!(lib, "OttoVersandFortsetzen", FnPushBlock),
            send_finalize: resolve!(lib, "OttoVersandAbschliessen", FnHandlePair),
            send_end: resolve!(lib, "OttoVersandBeenden", FnRelease),
            receive_begin: resolve!(lib, "OttoEmpfangBeginnen", FnReceiveBegin),
            receive_begin_pickup: resolve!(
                lib,
                "OttoEmpfangBeginnenAbholzertifikat",
                FnReceiveBeginPickup
            ),
            receive_continue: resolve!(lib, "OttoEmpfangFortsetzen", FnHandlePair),
            receive_end: resolve!(lib, "OttoEmpfangBeenden", FnRelease),
            fetch_data: resolve!(lib, "OttoDatenAbholen", FnFetchData),
            error_text: resolve!(lib, "OttoHoleFehlertext", FnErrorText),
            set_proxy: resolve!(lib, "OttoProxyKonfigurationSetzen", FnSetProxy),
            setting_set: resolve!(lib, "OttoEinstellungSetzen", FnSettingSet),
            setting_get: resolve!(lib, "OttoEinstellungLesen", FnSettingGet),
            version: resolve!(lib, "OttoVersion", FnVersion),
        })
    }
}

// ============================================================================
// DYNAMIC LIBRARY
// ============================================================================

/// The Otto shared library, loaded at runtime.
pub struct DynamicLibrary {
    path: PathBuf,
    fns: Functions,
    // Keeps the code behind `fns` mapped.
    _library: Library,
}

impl DynamicLibrary {
    /// Platform file name of the library (`libotto.so`, `libotto.dylib`, `otto.dll`).
    pub fn file_name() -> std::ffi::OsString {
        libloading::library_filename("otto")
    }

    /// Load the library from the directory that contains it.
    pub fn load(dir: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = dir.as_ref().join(Self::file_name());
        Self::load_file(path)
    }

    /// Load the library from an explicit file path.
    pub fn load_file(path: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let path = path.into();
        if !path.exists() {
            return Err(Error::LibraryNotFound(path));
        }

        // SAFETY: loading runs the library's initializers; Otto has no
        // initialization requirements beyond being loaded once per path.
        let library = unsafe { Library::new(&path) }
            .map_err(|e| Error::LibraryLoad(format!("{}: {}", path.display(), e)))?;
        let fns = Functions::resolve(&library)?;

        tracing::info!(path = %path.display(), "Loaded Otto library");

        Ok(Arc::new(Self {
            path,
            fns,
            _library: library,
        }))
    }

    /// Path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for DynamicLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicLibrary")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl OttoApi for DynamicLibrary {
    unsafe fn instance_create(
        &self,
        log_dir: Option<&CStr>,
        callback: Option<RawLogCallback>,
        user_data: *mut c_void,
        instance: &mut RawHandle,
    ) -> StatusCode {
        (self.fns.instance_create)(opt_ptr(log_dir), callback, user_data, instance.as_out_ptr())
    }

    unsafe fn instance_release(&self, instance: RawHandle) -> StatusCode {
        (self.fns.instance_release)(instance.as_ptr())
    }

    unsafe fn certificate_open(
        &self,
        instance: RawHandle,
        path: Option<&CStr>,
        password: Option<&CStr>,
        certificate: &mut RawHandle,
    ) -> StatusCode {
        (self.fns.certificate_open)(
            instance.as_ptr(),
            opt_ptr(path),
            opt_ptr(password),
            certificate.as_out_ptr(),
        )
    }

    unsafe fn certificate_close(&self, certificate: RawHandle) -> StatusCode {
        (self.fns.certificate_close)(certificate.as_ptr())
    }

    unsafe fn buffer_create(&self, instance: RawHandle, buffer: &mut RawHandle) -> StatusCode {
        (self.fns.buffer_create)(instance.as_ptr(), buffer.as_out_ptr())
    }

    unsafe fn buffer_size(&self, buffer: RawHandle) -> u64 {
        (self.fns.buffer_size)(buffer.as_ptr())
    }

    unsafe fn buffer_content(&self, buffer: RawHandle) -> *const u8 {
        (self.fns.buffer_content)(buffer.as_ptr()).cast()
    }

    unsafe fn buffer_release(&self, buffer: RawHandle) -> StatusCode {
        (self.fns.buffer_release)(buffer.as_ptr())
    }

    unsafe fn checksum_create(&self, instance: RawHandle, checksum: &mut RawHandle) -> StatusCode {
        (self.fns.checksum_create)(instance.as_ptr(), checksum.as_out_ptr())
    }

    unsafe fn checksum_update(&self, checksum: RawHandle, block: &[u8]) -> StatusCode {
        (self.fns.checksum_update)(checksum.as_ptr(), block.as_ptr().cast(), block.len() as u64)
    }

    unsafe fn checksum_sign(
        &self,
        checksum: RawHandle,
        certificate: RawHandle,
        buffer: RawHandle,
    ) -> StatusCode {
        (self.fns.checksum_sign)(checksum.as_ptr(), certificate.as_ptr(), buffer.as_ptr())
    }

    unsafe fn checksum_release(&self, checksum: RawHandle) -> StatusCode {
        (self.fns.checksum_release)(checksum.as_ptr())
    }

    unsafe fn send_begin(
        &self,
        instance: RawHandle,
        signed_checksum: &CStr,
        vendor_id: &CStr,
        send: &mut RawHandle,
    ) -> StatusCode {
        (self.fns.send_begin)(
            instance.as_ptr(),
            signed_checksum.as_ptr(),
            vendor_id.as_ptr(),
            send.as_out_ptr(),
        )
    }

    unsafe fn send_continue(&self, send: RawHandle, block: &[u8]) -> StatusCode {
        (self.fns.send_continue)(send.as_ptr(), block.as_ptr().cast(), block.len() as u64)
    }

    unsafe fn send_finalize(&self, send: RawHandle, object_id: RawHandle) -> StatusCode {
        (self.fns.send_finalize)(send.as_ptr(), object_id.as_ptr())
    }

    unsafe fn send_end(&self, send: RawHandle) -> StatusCode {
        (self.fns.send_end)(send.as_ptr())
    }

    unsafe fn receive_begin(
        &self,
        instance: RawHandle,
        object_id: &CStr,
        certificate: RawHandle,
        vendor_id: &CStr,
        pickup_certificate: Option<&CStr>,
        receive: &mut RawHandle,
    ) -> StatusCode {
        match pickup_certificate {
            None => (self.fns.receive_begin)(
                instance.as_ptr(),
                object_id.as_ptr(),
                certificate.as_ptr(),
                vendor_id.as_ptr(),
                receive.as_out_ptr(),
            ),
            Some(pickup) => (self.fns.receive_begin_pickup)(
                instance.as_ptr(),
                object_id.as_ptr(),
                certificate.as_ptr(),
                vendor_id.as_ptr(),
                pickup.as_ptr(),
                receive.as_out_ptr(),
            ),
        }
    }

    unsafe fn receive_continue(&self, receive: RawHandle, buffer: RawHandle) -> StatusCode {
        (self.fns.receive_continue)(receive.as_ptr(), buffer.as_ptr())
    }

    unsafe fn receive_end(&self, receive: RawHandle) -> StatusCode {
        (self.fns.receive_end)(receive.as_ptr())
    }

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
    ) -> StatusCode {
        (self.fns.fetch_data)(
            instance.as_ptr(),
            object_id.as_ptr(),
            expected_size,
            opt_ptr(certificate_path),
            opt_ptr(password),
            vendor_id.as_ptr(),
            opt_ptr(pickup_certificate),
            buffer.as_ptr(),
        )
    }

    fn error_text(&self, status: StatusCode) -> Option<String> {
        // SAFETY: the library returns a pointer to a static buffer, or null.
        unsafe { lossy_string((self.fns.error_text)(status.0)) }
    }

    unsafe fn set_proxy(&self, instance: RawHandle, proxy: Option<&RawProxyConfig>) -> StatusCode {
        let proxy = proxy.map_or(std::ptr::null(), |p| p as *const RawProxyConfig);
        (self.fns.set_proxy)(instance.as_ptr(), proxy)
    }

    unsafe fn setting_set(&self, instance: RawHandle, name: &CStr, value: &CStr) -> StatusCode {
        (self.fns.setting_set)(instance.as_ptr(), name.as_ptr(), value.as_ptr())
    }

    unsafe fn setting_get(
        &self,
        instance: RawHandle,
        name: &CStr,
        buffer: RawHandle,
    ) -> StatusCode {
        (self.fns.setting_get)(instance.as_ptr(), name.as_ptr(), buffer.as_ptr())
    }

    unsafe fn version(&self, buffer: RawHandle) -> StatusCode {
        (self.fns.version)(buffer.as_ptr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_mentions_otto() {
        let name = DynamicLibrary::file_name();
        assert!(name.to_string_lossy().contains("otto"));
    }

    #[test]
    fn test_load_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = DynamicLibrary::load(dir.path()).unwrap_err();
        match err {
            Error::LibraryNotFound(path) => assert!(path.starts_with(dir.path())),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DynamicLibrary::file_name());
        std::fs::write(&path, b"not a shared object").unwrap();
        let err = DynamicLibrary::load_file(&path).unwrap_err();
        assert!(matches!(err, Error::LibraryLoad(_)));
    }
}
