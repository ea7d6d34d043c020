//! # Return Buffer
//!
//! A native-owned byte buffer the library writes results into. Its bytes
//! are copied out before the buffer is released or written again.

use crate::error::{check, Error, Result};
use crate::ffi::RawHandle;
use crate::handle::{finish_scope, log_drop_release, BufferKind, NativeHandle};
use crate::instance::Instance;

/// A return buffer bound to the instance that created it.
pub struct ReturnBuffer<'i> {
    instance: &'i Instance,
    handle: NativeHandle<BufferKind>,
}

impl<'i> ReturnBuffer<'i> {
    /// Create an empty return buffer.
    pub fn create(instance: &'i Instance) -> Result<Self> {
        let api = instance.api();
        let raw_instance = instance.raw()?;
        // SAFETY: raw_instance is live while `instance` is open.
        let handle =
            NativeHandle::open(api, |slot| unsafe { api.buffer_create(raw_instance, slot) })?;
        Ok(Self { instance, handle })
    }

    /// Create a buffer, run `body` with it and release it again.
    ///
    /// The buffer is released on every path. A release failure is surfaced
    /// even when `body` failed.
    pub fn scoped<T>(
        instance: &'i Instance,
        body: impl FnOnce(&ReturnBuffer<'i>) -> Result<T>,
    ) -> Result<T> {
        let mut buffer = Self::create(instance)?;
        let result = body(&buffer);
        finish_scope(result, buffer.close())
    }

    pub(crate) fn raw(&self) -> Result<RawHandle> {
        self.handle.get()
    }

    /// Number of bytes the library has written.
    pub fn len(&self) -> Result<usize> {
        let raw = self.handle.get()?;
        // SAFETY: raw is live.
        let size = unsafe { self.instance.api().buffer_size(raw) };
        usize::try_from(size).map_err(|_| Error::BufferTooLarge(size))
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Append the current contents to `out`, returning the number of bytes copied.
    pub fn copy_into(&self, out: &mut Vec<u8>) -> Result<usize> {
        let raw = self.handle.get()?;
        let len = self.len()?;
        if len == 0 {
            return Ok(0);
        }
        // SAFETY: raw is live; the library guarantees `len` readable bytes
        // at the content pointer until the next write into this buffer.
        let ptr = unsafe { self.instance.api().buffer_content(raw) };
        if ptr.is_null() {
            return Ok(0);
        }
        let bytes = unsafe { std::slice::from_raw_parts(ptr, len) };
        out.extend_from_slice(bytes);
        Ok(len)
    }

    /// Copy the current contents.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.copy_into(&mut out)?;
        Ok(out)
    }

    /// Copy the current contents as UTF-8 text.
    pub fn to_utf8(&self) -> Result<String> {
        String::from_utf8(self.to_vec()?).map_err(|_| Error::InvalidUtf8)
    }

    /// Whether the buffer has been released.
    pub fn is_closed(&self) -> bool {
        self.handle.is_released()
    }

    /// Release the buffer. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let api = self.instance.api();
        // SAFETY: release() only passes a live handle.
        self.handle.release(api, |raw| unsafe { api.buffer_release(raw) })
    }
}

impl Drop for ReturnBuffer<'_> {
    fn drop(&mut self) {
        log_drop_release("return buffer", self.close());
    }
}

impl std::fmt::Debug for ReturnBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReturnBuffer").field("handle", &self.handle).finish()
    }
}

/// Run a native call that fills a return buffer and copy out the text.
pub(crate) fn fetch_text(
    instance: &Instance,
    fill: impl FnOnce(RawHandle) -> crate::ffi::StatusCode,
) -> Result<String> {
    ReturnBuffer::scoped(instance, |buffer| {
        check(instance.api(), fill(buffer.raw()?))?;
        buffer.to_utf8()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockOtto, Op};

    #[test]
    fn test_copy_reflects_current_contents() {
        let mock = MockOtto::shared();
        let instance = Instance::create(mock.clone(), None).unwrap();
        let buffer = ReturnBuffer::create(&instance).unwrap();

        mock.fill_buffer(buffer.raw().unwrap(), b"first");
        let first = buffer.to_vec().unwrap();
        mock.fill_buffer(buffer.raw().unwrap(), b"second!");

        assert_eq!(first, b"first");
        assert_eq!(buffer.to_vec().unwrap(), b"second!");
        assert_eq!(buffer.len().unwrap(), 7);
    }

    #[test]
    fn test_empty_buffer() {
        let mock = MockOtto::shared();
        let instance = Instance::create(mock, None).unwrap();
        let buffer = ReturnBuffer::create(&instance).unwrap();
        assert!(buffer.is_empty().unwrap());
        assert!(buffer.to_vec().unwrap().is_empty());
    }

    #[test]
    fn test_close_twice_releases_once() {
        let mock = MockOtto::shared();
        let instance = Instance::create(mock.clone(), None).unwrap();
        let mut buffer = ReturnBuffer::create(&instance).unwrap();

        buffer.close().unwrap();
        buffer.close().unwrap();
        drop(buffer);

        assert_eq!(mock.calls(Op::BufferRelease), 1);
        assert_eq!(mock.live_handles(), 1);
    }

    #[test]
    fn test_use_after_close_is_rejected() {
        let mock = MockOtto::shared();
        let instance = Instance::create(mock, None).unwrap();
        let mut buffer = ReturnBuffer::create(&instance).unwrap();
        buffer.close().unwrap();
        assert!(matches!(buffer.len(), Err(Error::HandleReleased("return buffer"))));
    }

    #[test]
    fn test_scoped_releases_on_body_error() {
        let mock = MockOtto::shared();
        let instance = Instance::create(mock.clone(), None).unwrap();

        let result: Result<()> = ReturnBuffer::scoped(&instance, |_| Err(Error::InvalidUtf8));
        assert!(matches!(result, Err(Error::InvalidUtf8)));
        assert_eq!(mock.calls(Op::BufferRelease), 1);
    }

    #[test]
    fn test_scoped_release_failure_wins() {
        let mock = MockOtto::shared();
        mock.set_error_text(11, "buffer release failed");
        mock.fail(Op::BufferRelease, 11);
        let instance = Instance::create(mock.clone(), None).unwrap();

        let result: Result<()> = ReturnBuffer::scoped(&instance, |_| Err(Error::InvalidUtf8));
        let err = result.unwrap_err();
        assert_eq!(err.code(), 11);
        assert_eq!(err.message(), Some("buffer release failed"));
    }
}
