//! # Checksum Accumulator
//!
//! Rolling checksum over the bytes of an object, signed once before a send
//! session can begin. Implements [`Write`], so a file can be fed in with
//! [`std::io::copy`].

use std::io::{self, Write};

use crate::certificate::Certificate;
use crate::error::{check, Error, Result};
use crate::handle::{log_drop_release, ChecksumKind, NativeHandle};
use crate::instance::Instance;
use crate::return_buffer::fetch_text;
use crate::transfer::{self, TransferBuffer};

/// A checksum accumulator.
pub struct ChecksumStream<'i> {
    instance: &'i Instance,
    handle: NativeHandle<ChecksumKind>,
    scratch: Option<TransferBuffer>,
    signed: bool,
}

impl<'i> ChecksumStream<'i> {
    /// Create an empty accumulator.
    pub fn open(instance: &'i Instance) -> Result<Self> {
        let api = instance.api();
        let raw_instance = instance.raw()?;
        // SAFETY: raw_instance is live while `instance` is open.
        let handle =
            NativeHandle::open(api, |slot| unsafe { api.checksum_create(raw_instance, slot) })?;
        Ok(Self {
            instance,
            handle,
            scratch: None,
            signed: false,
        })
    }

    /// Feed a block of bytes.
    pub fn update(&mut self, block: &[u8]) -> Result<()> {
        if self.signed {
            return Err(Error::AlreadyFinished);
        }
        let raw = self.handle.get()?;
        if block.is_empty() {
            return Ok(());
        }
        let api = self.instance.api();
        let staged = transfer::stage(&mut self.scratch, block);
        // SAFETY: raw is live; `staged` is valid for the call.
        check(api, unsafe { api.checksum_update(raw, staged) })
    }

    /// Feed a single byte.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.update(&[byte])
    }

    /// Sign the checksum with `certificate`, returning the signature.
    ///
    /// Can be called once; afterwards the accumulator only accepts `close`.
    pub fn sign(&mut self, certificate: &Certificate<'_>) -> Result<String> {
        if self.signed {
            return Err(Error::AlreadyFinished);
        }
        let raw = self.handle.get()?;
        let raw_certificate = certificate.raw()?;
        let api = self.instance.api();

        // SAFETY: all handles are live for the call.
        let signature = fetch_text(self.instance, |buffer| unsafe {
            api.checksum_sign(raw, raw_certificate, buffer)
        })?;
        self.signed = true;

        tracing::debug!(length = signature.len(), "Checksum signed");
        Ok(signature)
    }

    /// Capacity of the scratch buffer, if one has been allocated.
    pub fn scratch_capacity(&self) -> Option<usize> {
        self.scratch.as_ref().map(TransferBuffer::capacity)
    }

    /// Release the scratch buffer, then the accumulator.
    pub fn close(&mut self) -> Result<()> {
        transfer::release(&mut self.scratch);
        let api = self.instance.api();
        // SAFETY: release() only passes a live handle.
        self.handle.release(api, |raw| unsafe { api.checksum_release(raw) })
    }
}

impl Write for ChecksumStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf).map_err(Error::into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for ChecksumStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumStream")
            .field("handle", &self.handle)
            .field("signed", &self.signed)
            .finish()
    }
}

impl Drop for ChecksumStream<'_> {
    fn drop(&mut self) {
        log_drop_release("checksum", self.close());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::CertificateSource;
    use crate::ffi::StatusCode;
    use crate::testing::{MockOtto, Op};
    use crate::transfer::MIN_TRANSFER_CAPACITY;

    #[test]
    fn test_sign_hello() {
        let mock = MockOtto::shared();
        let instance = Instance::create(mock.clone(), None).unwrap();
        let cert = instance
            .open_certificate(&CertificateSource::file("test.pfx", "123456"))
            .unwrap();

        let mut checksum = ChecksumStream::open(&instance).unwrap();
        checksum.write_all(b"hel").unwrap();
        checksum.write_byte(b'l').unwrap();
        checksum.write_all(b"o").unwrap();
        let signature = checksum.sign(&cert).unwrap();

        assert_eq!(signature, MockOtto::signature_for(b"hello"));
        assert_eq!(mock.calls(Op::BufferCreate), mock.calls(Op::BufferRelease));
    }

    #[test]
    fn test_scratch_grows_past_floor() {
        let mock = MockOtto::shared();
        let instance = Instance::create(mock, None).unwrap();
        let mut checksum = ChecksumStream::open(&instance).unwrap();

        assert_eq!(checksum.scratch_capacity(), None);
        checksum.update(b"x").unwrap();
        assert_eq!(checksum.scratch_capacity(), Some(MIN_TRANSFER_CAPACITY));
        checksum.update(&vec![7u8; 20_000]).unwrap();
        assert_eq!(checksum.scratch_capacity(), Some(20_000));
    }

    #[test]
    fn test_update_failure_surfaces_code_and_text() {
        let mock = MockOtto::shared();
        mock.set_error_text(7, "checksum mismatch");
        mock.fail(Op::ChecksumUpdate, 7);
        let instance = Instance::create(mock, None).unwrap();
        let mut checksum = ChecksumStream::open(&instance).unwrap();

        let io_err = checksum.write(b"hello").unwrap_err();
        let err = Error::from_io(io_err);
        assert_eq!(err.status(), Some(StatusCode(7)));
        assert_eq!(err.message(), Some("checksum mismatch"));
    }

    #[test]
    fn test_sign_twice_rejected() {
        let mock = MockOtto::shared();
        let instance = Instance::create(mock.clone(), None).unwrap();
        let cert = instance
            .open_certificate(&CertificateSource::file("test.pfx", "123456"))
            .unwrap();
        let mut checksum = ChecksumStream::open(&instance).unwrap();
        checksum.update(b"a").unwrap();
        checksum.sign(&cert).unwrap();

        assert!(matches!(checksum.sign(&cert), Err(Error::AlreadyFinished)));
        assert!(matches!(checksum.update(b"b"), Err(Error::AlreadyFinished)));
        assert_eq!(mock.calls(Op::ChecksumSign), 1);
    }

    #[test]
    fn test_sign_with_closed_certificate() {
        let mock = MockOtto::shared();
        let instance = Instance::create(mock.clone(), None).unwrap();
        let mut cert = instance
            .open_certificate(&CertificateSource::file("test.pfx", "123456"))
            .unwrap();
        cert.close().unwrap();

        let mut checksum = ChecksumStream::open(&instance).unwrap();
        let err = checksum.sign(&cert).unwrap_err();
        assert!(matches!(err, Error::HandleReleased("certificate")));
        assert_eq!(mock.calls(Op::ChecksumSign), 0);
    }

    #[test]
    fn test_close_twice() {
        let mock = MockOtto::shared();
        let instance = Instance::create(mock.clone(), None).unwrap();
        let mut checksum = ChecksumStream::open(&instance).unwrap();
        checksum.update(b"abc").unwrap();

        checksum.close().unwrap();
        checksum.close().unwrap();
        assert_eq!(checksum.scratch_capacity(), None);
        drop(checksum);
        assert_eq!(mock.calls(Op::ChecksumRelease), 1);
    }

    #[test]
    fn test_release_failure_after_scratch_release() {
        let mock = MockOtto::shared();
        mock.fail(Op::ChecksumRelease, 5);
        let instance = Instance::create(mock.clone(), None).unwrap();
        let mut checksum = ChecksumStream::open(&instance).unwrap();
        checksum.update(b"abc").unwrap();

        let err = checksum.close().unwrap_err();
        assert_eq!(err.code(), 5);
        assert_eq!(checksum.scratch_capacity(), None);
        // Handle is inert after a failing release.
        assert!(checksum.close().is_ok());
    }
}
