//! # Receive Session
//!
//! Adapts the pull-based "fetch next block" native call to [`Read`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          RECEIVE STATE                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  chunk: bytes of the last fetched block, pos: cursor into it            │
//! │                                                                         │
//! │  read() ─┬─ pos < chunk.len()          ──► copy from chunk              │
//! │          ├─ nothing fetched yet         ──► fetch                       │
//! │          ├─ last block had size > 0     ──► fetch                       │
//! │          └─ last block had size 0       ──► end of data (no fetch)      │
//! │                                                                         │
//! │  fetch: receive_continue(session, buffer) then copy buffer → chunk      │
//! │         (one return buffer, created lazily, reused for every block)     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Once end of data is reached every further read reports it without
//! calling into the library again.

use std::io::{self, Read};

use crate::certificate::Certificate;
use crate::error::{check, Error, Result};
use crate::ffi::to_cstring;
use crate::handle::{finish_scope, log_drop_release, NativeHandle, ReceiveKind};
use crate::instance::Instance;
use crate::return_buffer::ReturnBuffer;

/// An open receive session.
pub struct ReceiveStream<'a> {
    instance: &'a Instance,
    // Held so the certificate cannot be closed while the session is open.
    _certificate: &'a Certificate<'a>,
    handle: NativeHandle<ReceiveKind>,
    buffer: Option<ReturnBuffer<'a>>,
    chunk: Vec<u8>,
    pos: usize,
    // Size of the most recently fetched block; `None` before the first fetch.
    last_block: Option<usize>,
    bytes_received: u64,
}

impl<'a> ReceiveStream<'a> {
    /// Begin receiving `object_id`.
    pub fn open(
        instance: &'a Instance,
        object_id: &str,
        certificate: &'a Certificate<'a>,
        vendor_id: &str,
    ) -> Result<Self> {
        Self::begin(instance, object_id, certificate, vendor_id, None)
    }

    /// Begin receiving `object_id`, re-encrypted for `pickup_certificate`
    /// (base64 PEM). The library passes the ciphertext through undecrypted.
    pub fn open_with_pickup_certificate(
        instance: &'a Instance,
        object_id: &str,
        certificate: &'a Certificate<'a>,
        vendor_id: &str,
        pickup_certificate: &str,
    ) -> Result<Self> {
        Self::begin(instance, object_id, certificate, vendor_id, Some(pickup_certificate))
    }

    fn begin(
        instance: &'a Instance,
        object_id: &str,
        certificate: &'a Certificate<'a>,
        vendor_id: &str,
        pickup_certificate: Option<&str>,
    ) -> Result<Self> {
        let raw_instance = instance.raw()?;
        let raw_certificate = certificate.raw()?;
        if object_id.is_empty() {
            return Err(Error::InvalidArgument("object id is empty".into()));
        }
        let c_object_id = to_cstring(object_id, "object id")?;
        let vendor_id = to_cstring(vendor_id, "vendor id")?;
        let pickup = pickup_certificate
            .map(|pem| to_cstring(pem, "pickup certificate"))
            .transpose()?;

        let api = instance.api();
        // SAFETY: instance and certificate handles are live.
        let handle = NativeHandle::open(api, |slot| unsafe {
            api.receive_begin(
                raw_instance,
                &c_object_id,
                raw_certificate,
                &vendor_id,
                pickup.as_deref(),
                slot,
            )
        })?;

        tracing::info!(object_id, pickup = pickup_certificate.is_some(), "Receive session started");
        Ok(Self {
            instance,
            _certificate: certificate,
            handle,
            buffer: None,
            chunk: Vec::new(),
            pos: 0,
            last_block: None,
            bytes_received: 0,
        })
    }

    fn fetch(&mut self) -> Result<()> {
        let raw = self.handle.get()?;
        if self.buffer.is_none() {
            self.buffer = Some(ReturnBuffer::create(self.instance)?);
        }
        let Some(buffer) = self.buffer.as_ref() else {
            return Err(Error::HandleReleased("return buffer"));
        };
        let raw_buffer = buffer.raw()?;

        let api = self.instance.api();
        // SAFETY: session and buffer are live.
        check(api, unsafe { api.receive_continue(raw, raw_buffer) })?;

        self.chunk.clear();
        let size = buffer.copy_into(&mut self.chunk)?;
        self.pos = 0;
        self.last_block = Some(size);
        self.bytes_received += size as u64;
        tracing::trace!(size, "Fetched block");
        Ok(())
    }

    /// Make unread bytes available. `false` means end of data.
    fn fill(&mut self) -> Result<bool> {
        loop {
            if self.pos < self.chunk.len() {
                return Ok(true);
            }
            if self.last_block == Some(0) {
                return Ok(false);
            }
            self.fetch()?;
        }
    }

    /// Read one byte; `None` at end of data.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if !self.fill().map_err(Error::into_io)? {
            return Ok(None);
        }
        let byte = self.chunk[self.pos];
        self.pos += 1;
        Ok(Some(byte))
    }

    /// Whether the end of data has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.last_block == Some(0) && self.pos >= self.chunk.len()
    }

    /// Total bytes fetched from the library so far.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Release the return buffer, then end the session.
    ///
    /// The session is ended even if releasing the buffer fails; when both
    /// fail the session error is returned.
    pub fn close(&mut self) -> Result<()> {
        let buffer_result = match self.buffer.take() {
            Some(mut buffer) => buffer.close(),
            None => Ok(()),
        };
        self.chunk = Vec::new();
        self.pos = 0;

        let api = self.instance.api();
        // SAFETY: release() only passes a live handle.
        let session_result = self.handle.release(api, |raw| unsafe { api.receive_end(raw) });
        finish_scope(buffer_result, session_result)
    }
}

impl Read for ReceiveStream<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < out.len() {
            match self.fill() {
                Ok(true) => {}
                Ok(false) => break,
                // Bytes already copied are reported; the next call fetches again.
                Err(e) if written > 0 => {
                    tracing::debug!(error = %e, written, "Fetch failed after partial read");
                    break;
                }
                Err(e) => return Err(e.into_io()),
            }
            let available = &self.chunk[self.pos..];
            let n = available.len().min(out.len() - written);
            out[written..written + n].copy_from_slice(&available[..n]);
            self.pos += n;
            written += n;
        }
        Ok(written)
    }
}

impl std::fmt::Debug for ReceiveStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveStream")
            .field("handle", &self.handle)
            .field("bytes_received", &self.bytes_received)
            .finish()
    }
}

impl Drop for ReceiveStream<'_> {
    fn drop(&mut self) {
        log_drop_release("receive", self.close());
    }
}
