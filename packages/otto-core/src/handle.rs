//! # Native Handles
//!
//! Typed, checked wrapper around a [`RawHandle`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        HANDLE STATE MACHINE                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   Unopened ──open()──► Open ──release()──► Closed                       │
//! │                          │                    │                         │
//! │                          │ get() → raw        │ get() → HandleReleased  │
//! │                          │                    │ release() → no-op       │
//! │                                                                         │
//! │   The raw pointer is nulled BEFORE the native status is checked,        │
//! │   so a failing release still leaves the handle inert.                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::marker::PhantomData;

use crate::error::{check, Error, Result};
use crate::ffi::{OttoApi, RawHandle, StatusCode};

/// Marker for the kind of native resource a handle refers to.
pub trait HandleKind {
    /// Name used in errors and log lines
    const NAME: &'static str;
}

macro_rules! handle_kinds {
    ($($(#[$meta:meta])* $kind:ident => $name:literal;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug)]
            pub enum $kind {}

            impl HandleKind for $kind {
                const NAME: &'static str = $name;
            }
        )*
    };
}

handle_kinds! {
    /// An Otto instance
    InstanceKind => "instance";
    /// An opened certificate
    CertificateKind => "certificate";
    /// A return buffer
    BufferKind => "return buffer";
    /// A checksum accumulator
    ChecksumKind => "checksum";
    /// A send session
    SendKind => "send";
    /// A receive session
    ReceiveKind => "receive";
}

/// A native handle of kind `K`.
///
/// Does not release anything on drop; owners call [`release`](Self::release)
/// from their own `close`/`Drop`.
pub struct NativeHandle<K: HandleKind> {
    raw: RawHandle,
    _kind: PhantomData<K>,
}

impl<K: HandleKind> NativeHandle<K> {
    /// Run a native open/create function and wrap the handle it writes.
    pub(crate) fn open(
        api: &dyn OttoApi,
        create: impl FnOnce(&mut RawHandle) -> StatusCode,
    ) -> Result<Self> {
        let mut raw = RawHandle::null();
        check(api, create(&mut raw))?;
        tracing::debug!(kind = K::NAME, handle = raw.addr(), "Opened handle");
        Ok(Self {
            raw,
            _kind: PhantomData,
        })
    }

    /// The raw handle, or [`Error::HandleReleased`] once released.
    pub fn get(&self) -> Result<RawHandle> {
        if self.raw.is_null() {
            Err(Error::HandleReleased(K::NAME))
        } else {
            Ok(self.raw)
        }
    }

    /// Whether the handle has been released.
    pub fn is_released(&self) -> bool {
        self.raw.is_null()
    }

    /// Null the handle, returning the previous value if it was live.
    pub(crate) fn take(&mut self) -> Option<RawHandle> {
        let raw = std::mem::take(&mut self.raw);
        (!raw.is_null()).then_some(raw)
    }

    /// Release through `destroy`. A released handle is a no-op.
    pub(crate) fn release(
        &mut self,
        api: &dyn OttoApi,
        destroy: impl FnOnce(RawHandle) -> StatusCode,
    ) -> Result<()> {
        let Some(raw) = self.take() else {
            return Ok(());
        };
        let status = destroy(raw);
        tracing::debug!(kind = K::NAME, handle = raw.addr(), %status, "Released handle");
        check(api, status)
    }
}

impl<K: HandleKind> fmt::Debug for NativeHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &K::NAME)
            .field("raw", &self.raw.as_ptr())
            .finish()
    }
}

// ============================================================================
// SCOPED CLEANUP
// ============================================================================

/// Combine the outcome of a body with the outcome of its cleanup.
///
/// A cleanup failure is surfaced even when the body already failed; the
/// body's error is logged and dropped.
pub(crate) fn finish_scope<T>(body: Result<T>, cleanup: Result<()>) -> Result<T> {
    match (body, cleanup) {
        (body, Ok(())) => body,
        (Ok(_), Err(cleanup)) => Err(cleanup),
        (Err(body), Err(cleanup)) => {
            tracing::debug!(error = %body, "Error superseded by cleanup failure");
            Err(cleanup)
        }
    }
}

/// Log the outcome of a release attempted from `Drop`.
pub(crate) fn log_drop_release(kind: &'static str, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!(kind, error = %e, "Release during drop failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockOtto;

    fn open_handle(mock: &MockOtto) -> NativeHandle<ChecksumKind> {
        NativeHandle::open(mock, |slot| {
            *slot = RawHandle::from_addr(0x40);
            StatusCode::OK
        })
        .unwrap()
    }

    #[test]
    fn test_open_failure_translates_status() {
        let mock = MockOtto::new();
        mock.set_error_text(7, "checksum mismatch");
        let err = NativeHandle::<ChecksumKind>::open(&mock, |_| StatusCode(7)).unwrap_err();
        assert_eq!(err.code(), 7);
        assert_eq!(err.message(), Some("checksum mismatch"));
    }

    #[test]
    fn test_release_twice_destroys_once() {
        let mock = MockOtto::new();
        let mut handle = open_handle(&mock);
        let mut destroyed = Vec::new();

        handle
            .release(&mock, |raw| {
                destroyed.push(raw);
                StatusCode::OK
            })
            .unwrap();
        handle
            .release(&mock, |raw| {
                destroyed.push(raw);
                StatusCode::OK
            })
            .unwrap();

        assert_eq!(destroyed, vec![RawHandle::from_addr(0x40)]);
        assert!(handle.is_released());
    }

    #[test]
    fn test_failing_release_still_nulls() {
        let mock = MockOtto::new();
        let mut handle = open_handle(&mock);

        let err = handle.release(&mock, |_| StatusCode(3)).unwrap_err();
        assert_eq!(err.code(), 3);
        assert!(handle.is_released());
        assert!(matches!(handle.get(), Err(Error::HandleReleased("checksum"))));
    }

    #[test]
    fn test_finish_scope_prefers_cleanup_error() {
        let body: Result<()> = Err(Error::InvalidUtf8);
        let cleanup: Result<()> = Err(Error::AlreadyFinished);
        let err = finish_scope(body, cleanup).unwrap_err();
        assert!(matches!(err, Error::AlreadyFinished));

        let ok = finish_scope(Ok(5), Ok(())).unwrap();
        assert_eq!(ok, 5);

        let body_err = finish_scope::<()>(Err(Error::InvalidUtf8), Ok(())).unwrap_err();
        assert!(matches!(body_err, Error::InvalidUtf8));
    }
}
