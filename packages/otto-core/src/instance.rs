//! # Instance
//!
//! Top-level session with the Otto library. Everything else (certificates,
//! buffers, checksums, sessions) borrows an [`Instance`], so the compiler
//! enforces that they are closed before it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          OWNERSHIP                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Instance                                                               │
//! │  ├── Arc<dyn OttoApi>          keeps the library loaded                 │
//! │  ├── NativeHandle<Instance>                                             │
//! │  └── Box<Arc<dyn LogSink>>     address handed to C as user data;        │
//! │                                lives until the Instance is dropped      │
//! │                                                                         │
//! │  Certificate<'i>, ReturnBuffer<'i>, ChecksumStream<'i>,                 │
//! │  SendStream<'i>, ReceiveStream<'i>    all borrow &'i Instance           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::os::raw::c_void;
use std::path::Path;
use std::sync::Arc;

use crate::certificate::{Certificate, CertificateSource};
use crate::config::{FetchRequest, ProxyConfig};
use crate::error::{check, Result};
use crate::ffi::{path_to_cstring, to_cstring, to_opt_cstring, OttoApi, RawHandle};
use crate::handle::{InstanceKind, NativeHandle};
use crate::log::{log_trampoline, LogSink};
use crate::return_buffer::{fetch_text, ReturnBuffer};

/// An Otto instance.
pub struct Instance {
    api: Arc<dyn OttoApi>,
    handle: NativeHandle<InstanceKind>,
    // Must outlive the native instance; dropped after `handle` is released.
    log_sink: Option<Box<Arc<dyn LogSink>>>,
}

impl Instance {
    /// Create an instance without a log callback.
    ///
    /// `log_dir` is where the library writes `otto.log`; `None` lets it use
    /// the system temp directory.
    pub fn create(api: Arc<dyn OttoApi>, log_dir: Option<&Path>) -> Result<Self> {
        Self::create_inner(api, log_dir, None)
    }

    /// Create an instance that forwards native log lines to `sink`.
    pub fn create_with_log_sink(
        api: Arc<dyn OttoApi>,
        log_dir: Option<&Path>,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self> {
        Self::create_inner(api, log_dir, Some(Box::new(sink)))
    }

    fn create_inner(
        api: Arc<dyn OttoApi>,
        log_dir: Option<&Path>,
        log_sink: Option<Box<Arc<dyn LogSink>>>,
    ) -> Result<Self> {
        let log_dir = log_dir.map(|dir| path_to_cstring(dir, "log directory")).transpose()?;
        let (callback, user_data) = match &log_sink {
            Some(sink) => (
                Some(log_trampoline as crate::ffi::RawLogCallback),
                &**sink as *const Arc<dyn LogSink> as *mut c_void,
            ),
            None => (None, std::ptr::null_mut()),
        };

        // SAFETY: user_data points into `log_sink`, which is stored in the
        // returned Instance and outlives the native instance.
        let handle = NativeHandle::open(api.as_ref(), |slot| unsafe {
            api.instance_create(log_dir.as_deref(), callback, user_data, slot)
        })?;

        tracing::info!(logging = log_sink.is_some(), "Otto instance created");

        Ok(Self {
            api,
            handle,
            log_sink,
        })
    }

    /// The native call table this instance uses.
    pub fn api(&self) -> &dyn OttoApi {
        self.api.as_ref()
    }

    pub(crate) fn raw(&self) -> Result<RawHandle> {
        self.handle.get()
    }

    /// Whether a log sink is registered.
    pub fn has_log_sink(&self) -> bool {
        self.log_sink.is_some()
    }

    /// Whether the instance has been released.
    pub fn is_closed(&self) -> bool {
        self.handle.is_released()
    }

    /// Open a certificate bound to this instance.
    pub fn open_certificate(&self, source: &CertificateSource) -> Result<Certificate<'_>> {
        Certificate::open(self, source)
    }

    /// Configure the proxy; `None` removes it.
    pub fn set_proxy(&self, proxy: Option<&ProxyConfig>) -> Result<()> {
        let raw = self.raw()?;
        let marshaled = proxy.map(ProxyConfig::marshal).transpose()?;
        let config = marshaled.as_ref().map(|m| m.raw());
        // SAFETY: the strings behind `config` live in `marshaled` for the call.
        let status = unsafe { self.api.set_proxy(raw, config.as_ref()) };
        check(self.api(), status)?;
        tracing::debug!(enabled = proxy.is_some(), "Proxy configuration set");
        Ok(())
    }

    /// Set an instance setting.
    pub fn set_setting(&self, name: &str, value: &str) -> Result<()> {
        let raw = self.raw()?;
        let name = to_cstring(name, "setting name")?;
        let value = to_cstring(value, "setting value")?;
        // SAFETY: raw is live.
        check(self.api(), unsafe { self.api.setting_set(raw, &name, &value) })
    }

    /// Read an instance setting.
    pub fn setting(&self, name: &str) -> Result<String> {
        let raw = self.raw()?;
        let name = to_cstring(name, "setting name")?;
        // SAFETY: raw and the buffer are live for the call.
        fetch_text(self, |buffer| unsafe { self.api.setting_get(raw, &name, buffer) })
    }

    /// Version string of the loaded library.
    pub fn library_version(&self) -> Result<String> {
        self.raw()?;
        // SAFETY: the buffer is live for the call.
        fetch_text(self, |buffer| unsafe { self.api.version(buffer) })
    }

    /// Fetch a whole object in a single call.
    pub fn fetch_data(&self, request: &FetchRequest) -> Result<Vec<u8>> {
        let raw = self.raw()?;
        let object_id = to_cstring(&request.object_id, "object id")?;
        let certificate =
            to_opt_cstring(request.certificate_location.as_deref(), "certificate path")?;
        let password = to_opt_cstring(request.password.as_deref(), "certificate password")?;
        let vendor_id = to_cstring(&request.vendor_id, "vendor id")?;
        let pickup = to_opt_cstring(request.pickup_certificate.as_deref(), "pickup certificate")?;

        let data = ReturnBuffer::scoped(self, |buffer| {
            let buffer_raw = buffer.raw()?;
            // SAFETY: all handles are live for the call.
            let status = unsafe {
                self.api.fetch_data(
                    raw,
                    &object_id,
                    request.expected_size,
                    certificate.as_deref(),
                    password.as_deref(),
                    &vendor_id,
                    pickup.as_deref(),
                    buffer_raw,
                )
            };
            check(self.api(), status)?;
            buffer.to_vec()
        })?;

        tracing::info!(object_id = %request.object_id, bytes = data.len(), "Fetched object");
        Ok(data)
    }

    /// Release the instance. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let api = self.api.as_ref();
        // SAFETY: release() only passes a live handle.
        self.handle.release(api, |raw| unsafe { api.instance_release(raw) })
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "Failed to release Otto instance");
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("handle", &self.handle)
            .field("log_sink", &self.log_sink.is_some())
            .finish()
    }
}
